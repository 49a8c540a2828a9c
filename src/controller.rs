//! 挑战循环控制
//!
//! 每个 tick：应用热键 → 暂停则重新开始本轮 → 否则检测当前标识并前进。
//! 状态放在不可变的 [`Context`] 中，[`Controller::step`] 返回新状态和待执行动作，
//! 不直接点击也不等待，便于在测试里驱动。

use std::fmt;

use tracing::info;

use crate::detector::{self, Detection};
use crate::hotkey::{HotkeyState, PauseState};
use crate::profile::{FlagRole, Profile};
use crate::vision::{Point, Vision, WindowSize};

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Context {
    pub pause: PauseState,
    /// 连续继续挑战次数
    pub challenges: u32,
    /// 下一个要检测的标识下标
    pub cursor: usize,
}

impl Context {
    pub fn paused(&self) -> bool {
        self.pause.paused
    }

    pub fn kill_all(&self) -> bool {
        self.pause.kill_all
    }
}

/// 退出原因（均为正常结束）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// 连续挑战次数超过上限
    ChallengeLimit { count: u32 },
    /// 奖励宝箱已领完，当前是最后一局
    LastRound,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ChallengeLimit { count } => write!(f, "挑战次数被限制 ({count})"),
            ExitReason::LastRound => write!(f, "最后一局"),
        }
    }
}

/// 待执行动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click(Point),
    Exit(ExitReason),
}

/// 单个 tick 的输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInput {
    pub hotkeys: HotkeyState,
    pub window: WindowSize,
}

/// 单个 tick 的输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub context: Context,
    pub actions: Vec<Action>,
}

impl Step {
    fn idle(context: Context) -> Self {
        Self {
            context,
            actions: Vec::new(),
        }
    }

    fn exit(context: Context, reason: ExitReason) -> Self {
        Self {
            context,
            actions: vec![Action::Exit(reason)],
        }
    }
}

/// 挑战循环控制器
#[derive(Debug, Clone)]
pub struct Controller {
    profile: Profile,
}

impl Controller {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// 推进一个 tick
    pub fn step(&self, context: Context, input: TickInput, vision: &mut dyn Vision) -> Step {
        let mut ctx = context;
        ctx.pause = ctx.pause.apply(input.hotkeys);

        if ctx.paused() {
            info!("已暂停！。。。。。");
            ctx.cursor = 0;
            return Step::idle(ctx);
        }

        let flags = &self.profile.flags;
        let Some(flag) = flags.get(ctx.cursor % flags.len().max(1)) else {
            return Step::idle(ctx);
        };
        ctx.cursor = (ctx.cursor + 1) % flags.len();

        let Detection { matched, clicks } =
            detector::detect(flag, vision, input.window, self.profile.threshold);
        if !matched {
            return Step::idle(ctx);
        }

        match flag.role {
            FlagRole::Continue => {
                ctx.challenges += 1;
                if ctx.challenges > self.profile.max_challenges {
                    info!("挑战次数被限制，主动退出！。。。。。");
                    return Step::exit(
                        ctx,
                        ExitReason::ChallengeLimit {
                            count: ctx.challenges,
                        },
                    );
                }
                if !ctx.kill_all() && self.is_last_round(vision, input.window) {
                    info!("最后一局，主动退出！。。。。。");
                    return Step::exit(ctx, ExitReason::LastRound);
                }
            }
            FlagRole::Reset => {
                if ctx.challenges != 0 {
                    info!("【{}】计数清零 ({} → 0)", flag.name, ctx.challenges);
                }
                ctx.challenges = 0;
            }
        }

        Step {
            context: ctx,
            actions: clicks.into_iter().map(Action::Click).collect(),
        }
    }

    /// 奖励宝箱不存在即为最后一局；未配置宝箱时永远不是最后一局
    fn is_last_round(&self, vision: &mut dyn Vision, window: WindowSize) -> bool {
        let Some(marker) = &self.profile.end_marker else {
            return false;
        };
        info!("查找【最后一局】标识");
        detector::probe(marker, vision, window, self.profile.threshold).is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::vision::{MatchResult, Rect, Size, VisionError};

    const WINDOW: WindowSize = Size::new(1080, 2400);
    const JXTZ: &str = "assets/zhenfa_jxtz.png";
    const BOX: &str = "assets/zhenfa_jiangli_box.png";
    const WIN: &str = "assets/tzcg.png";

    #[derive(Default)]
    struct FixedVision {
        hits: HashMap<PathBuf, f32>,
        calls: usize,
    }

    impl FixedVision {
        fn with(mut self, asset: &str, confidence: f32) -> Self {
            self.hits.insert(PathBuf::from(asset), confidence);
            self
        }
    }

    impl Vision for FixedVision {
        fn locate(&mut self, asset: &Path, _region: Rect) -> Result<MatchResult, VisionError> {
            self.calls += 1;
            Ok(MatchResult {
                confidence: self.hits.get(asset).copied().unwrap_or(0.0),
                position: Point::new(500, 1450),
                size: Size::new(240, 86),
            })
        }
    }

    fn running(challenges: u32, kill_all: bool) -> Context {
        Context {
            pause: PauseState {
                paused: false,
                kill_all,
            },
            challenges,
            cursor: 0,
        }
    }

    fn input(hotkeys: HotkeyState) -> TickInput {
        TickInput {
            hotkeys,
            window: WINDOW,
        }
    }

    #[test]
    fn test_paused_tick_skips_detectors_and_rewinds() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9);
        let ctx = Context {
            cursor: 2,
            ..Context::default()
        };

        let step = controller.step(ctx, input(HotkeyState::default()), &mut vision);
        assert!(step.actions.is_empty());
        assert_eq!(step.context.cursor, 0);
        assert_eq!(vision.calls, 0);
    }

    #[test]
    fn test_continue_clicks_and_counts() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9).with(BOX, 0.9);

        let step = controller.step(running(0, false), input(HotkeyState::default()), &mut vision);
        assert_eq!(step.actions, vec![Action::Click(Point::new(620, 1493))]);
        assert_eq!(step.context.challenges, 1);
        assert_eq!(step.context.cursor, 1);
    }

    #[test]
    fn test_cap_exits_before_click() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9).with(BOX, 0.9);

        let step = controller.step(running(5, false), input(HotkeyState::default()), &mut vision);
        assert_eq!(
            step.actions,
            vec![Action::Exit(ExitReason::ChallengeLimit { count: 6 })]
        );
    }

    #[test]
    fn test_last_round_exits_without_click() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9);

        let step = controller.step(running(0, false), input(HotkeyState::default()), &mut vision);
        assert_eq!(step.actions, vec![Action::Exit(ExitReason::LastRound)]);
    }

    #[test]
    fn test_kill_all_skips_last_round_check() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9);

        let step = controller.step(running(0, true), input(HotkeyState::default()), &mut vision);
        assert_eq!(step.actions, vec![Action::Click(Point::new(620, 1493))]);
        // 只查找了继续挑战，没有查找宝箱
        assert_eq!(vision.calls, 1);
    }

    #[test]
    fn test_reset_flag_clears_counter() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(WIN, 0.9);
        let ctx = Context {
            cursor: 1,
            ..running(4, false)
        };

        let step = controller.step(ctx, input(HotkeyState::default()), &mut vision);
        assert_eq!(step.context.challenges, 0);
        assert_eq!(step.context.cursor, 2);
        assert!(step.actions.is_empty());
    }

    #[test]
    fn test_miss_keeps_counter() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default();
        let ctx = Context {
            cursor: 3,
            ..running(3, false)
        };

        let step = controller.step(ctx, input(HotkeyState::default()), &mut vision);
        assert_eq!(step.context.challenges, 3);
        assert_eq!(step.context.cursor, 0);
    }

    #[test]
    fn test_resume_hotkey_runs_detector_same_tick() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(JXTZ, 0.9).with(BOX, 0.9);
        let keys = HotkeyState {
            resume: true,
            ..HotkeyState::default()
        };

        let step = controller.step(Context::default(), input(keys), &mut vision);
        assert!(!step.context.paused());
        assert_eq!(step.actions.len(), 1);
    }

    #[test]
    fn test_pause_hotkey_stops_mid_cycle() {
        let controller = Controller::new(Profile::builtin());
        let mut vision = FixedVision::default().with(WIN, 0.9);
        let ctx = Context {
            cursor: 1,
            ..running(2, false)
        };
        let keys = HotkeyState {
            pause: true,
            ..HotkeyState::default()
        };

        let step = controller.step(ctx, input(keys), &mut vision);
        assert!(step.context.paused());
        assert_eq!(step.context.cursor, 0);
        assert_eq!(step.context.challenges, 2);
        assert_eq!(vision.calls, 0);
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::LastRound.to_string(), "最后一局");
        assert_eq!(
            ExitReason::ChallengeLimit { count: 6 }.to_string(),
            "挑战次数被限制 (6)"
        );
    }
}
