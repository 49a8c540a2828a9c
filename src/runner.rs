//! 循环驱动
//!
//! 把控制器接到具体后端上：采样热键、等待、推进一个 tick、执行点击。
//! `run` 使用真实等待，测试直接调用 `tick`。

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::controller::{Action, Context, Controller, ExitReason, TickInput};
use crate::hotkey::HotkeyState;
use crate::profile::HotkeySpec;
use crate::vision::{Point, Vision, WindowSize};

/// 外部服务：窗口、按键、鼠标与模板匹配
pub trait Backend: Vision {
    /// 当前窗口尺寸
    fn window_size(&mut self) -> WindowSize;

    /// 组合键是否全部按下
    fn keys_down(&mut self, keys: &[String]) -> bool;

    /// 点击窗口内坐标
    fn click(&mut self, at: Point) -> Result<()>;
}

/// 挑战循环
pub struct Runner<B> {
    controller: Controller,
    backend: B,
    context: Context,
    interval: Duration,
}

impl<B: Backend> Runner<B> {
    pub fn new(controller: Controller, backend: B) -> Self {
        let interval = Duration::from_millis(controller.profile().interval_ms);
        Self {
            controller,
            backend,
            context: Context::default(),
            interval,
        }
    }

    /// 指定初始状态（例如启动即运行）
    pub fn starting_with(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> Context {
        self.context
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// 采样热键
    pub fn poll_hotkeys(&mut self) -> HotkeyState {
        let spec: &HotkeySpec = &self.controller.profile().hotkeys;
        HotkeyState {
            resume: self.backend.keys_down(&spec.resume),
            resume_kill_all: self.backend.keys_down(&spec.resume_kill_all),
            pause: self.backend.keys_down(&spec.pause),
        }
    }

    /// 不等待地推进一个 tick，返回退出原因（如有）
    pub fn tick(&mut self) -> Option<ExitReason> {
        let hotkeys = self.poll_hotkeys();
        self.advance(hotkeys)
    }

    /// 一直运行到退出条件出现
    pub fn run(&mut self) -> ExitReason {
        info!(
            "[Runner] 启动 | 间隔: {}ms | 上限: {} | 热键: 恢复={:?} 全部挑战={:?} 暂停={:?}",
            self.interval.as_millis(),
            self.controller.profile().max_challenges,
            self.controller.profile().hotkeys.resume,
            self.controller.profile().hotkeys.resume_kill_all,
            self.controller.profile().hotkeys.pause,
        );

        loop {
            let hotkeys = self.poll_hotkeys();
            thread::sleep(self.interval);
            if let Some(reason) = self.advance(hotkeys) {
                return reason;
            }
        }
    }

    fn advance(&mut self, hotkeys: HotkeyState) -> Option<ExitReason> {
        let input = TickInput {
            hotkeys,
            window: self.backend.window_size(),
        };
        let step = self.controller.step(self.context, input, &mut self.backend);
        self.context = step.context;

        for action in step.actions {
            match action {
                Action::Click(at) => {
                    if let Err(e) = self.backend.click(at) {
                        warn!("[Runner] 点击 ({}, {}) 失败: {:#}", at.x, at.y, e);
                    }
                }
                Action::Exit(reason) => {
                    info!("[Runner] 主动退出: {}", reason);
                    return Some(reason);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::profile::Profile;
    use crate::vision::{MatchResult, Rect, Size, VisionError};

    /// 什么都找不到的后端，记录按键查询
    #[derive(Default)]
    struct Blind {
        held: Vec<String>,
        locates: usize,
    }

    impl Vision for Blind {
        fn locate(&mut self, _asset: &Path, _region: Rect) -> Result<MatchResult, VisionError> {
            self.locates += 1;
            Ok(MatchResult {
                confidence: 0.0,
                position: Point::default(),
                size: Size::default(),
            })
        }
    }

    impl Backend for Blind {
        fn window_size(&mut self) -> WindowSize {
            Size::new(1080, 2400)
        }

        fn keys_down(&mut self, keys: &[String]) -> bool {
            keys.iter().all(|k| self.held.contains(k))
        }

        fn click(&mut self, _at: Point) -> Result<()> {
            anyhow::bail!("no clicks expected")
        }
    }

    #[test]
    fn test_poll_hotkeys_uses_profile_combos() {
        let mut runner = Runner::new(Controller::new(Profile::builtin()), Blind::default());
        runner.backend_mut().held = vec!["LControl".into(), "D".into()];

        let keys = runner.poll_hotkeys();
        assert!(!keys.resume);
        assert!(keys.resume_kill_all);
        assert!(!keys.pause);
    }

    #[test]
    fn test_cycles_through_all_flags() {
        let mut runner = Runner::new(Controller::new(Profile::builtin()), Blind::default());
        runner.backend_mut().held = vec!["LControl".into(), "S".into()];

        for _ in 0..8 {
            assert_eq!(runner.tick(), None);
        }
        assert_eq!(runner.backend().locates, 8);
        assert_eq!(runner.context().cursor, 0);
    }

    #[test]
    fn test_stays_paused_without_hotkey() {
        let mut runner = Runner::new(Controller::new(Profile::builtin()), Blind::default());
        for _ in 0..3 {
            assert_eq!(runner.tick(), None);
        }
        assert_eq!(runner.backend().locates, 0);
        assert!(runner.context().paused());
    }
}
