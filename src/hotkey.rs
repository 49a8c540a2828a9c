//! 暂停/恢复热键
//!
//! 每个 tick 采样一次热键状态，按 恢复 → 全部挑战 → 暂停 的顺序应用，
//! 同时按下时暂停优先。

use tracing::info;

/// 一次采样中各热键组合是否按下
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HotkeyState {
    /// LControl+S
    pub resume: bool,
    /// LControl+D
    pub resume_kill_all: bool,
    /// LControl+A
    pub pause: bool,
}

/// 暂停与全部挑战标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseState {
    pub paused: bool,
    pub kill_all: bool,
}

impl Default for PauseState {
    /// 启动时处于暂停状态
    fn default() -> Self {
        Self {
            paused: true,
            kill_all: false,
        }
    }
}

impl PauseState {
    /// 应用一次热键采样，返回新状态
    pub fn apply(self, keys: HotkeyState) -> Self {
        let mut next = self;
        if keys.resume {
            info!("[Hotkey] 恢复 按下！。。。。。");
            next.paused = false;
        }
        if keys.resume_kill_all {
            info!("[Hotkey] 全部挑战 按下！。。。。。");
            next.paused = false;
            next.kill_all = true;
        }
        if keys.pause {
            info!("[Hotkey] 暂停 按下！。。。。。");
            next.paused = true;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(resume: bool, resume_kill_all: bool, pause: bool) -> HotkeyState {
        HotkeyState {
            resume,
            resume_kill_all,
            pause,
        }
    }

    #[test]
    fn test_starts_paused() {
        let state = PauseState::default();
        assert!(state.paused);
        assert!(!state.kill_all);
    }

    #[test]
    fn test_resume_and_pause() {
        let state = PauseState::default().apply(keys(true, false, false));
        assert!(!state.paused);
        let state = state.apply(keys(false, false, true));
        assert!(state.paused);
    }

    #[test]
    fn test_kill_all_is_sticky() {
        let state = PauseState::default().apply(keys(false, true, false));
        assert!(!state.paused);
        assert!(state.kill_all);

        let state = state.apply(keys(false, false, true));
        assert!(state.paused);
        assert!(state.kill_all);
    }

    #[test]
    fn test_pause_wins_when_all_held() {
        let state = PauseState::default().apply(keys(true, true, true));
        assert!(state.paused);
        assert!(state.kill_all);
    }

    proptest! {
        #[test]
        fn prop_transitions_follow_priority(
            paused in any::<bool>(),
            kill_all in any::<bool>(),
            resume in any::<bool>(),
            resume_kill_all in any::<bool>(),
            pause in any::<bool>(),
        ) {
            let before = PauseState { paused, kill_all };
            let after = before.apply(keys(resume, resume_kill_all, pause));

            let expected_paused = if pause {
                true
            } else if resume || resume_kill_all {
                false
            } else {
                paused
            };
            prop_assert_eq!(after.paused, expected_paused);
            prop_assert_eq!(after.kill_all, kill_all || resume_kill_all);
        }

        #[test]
        fn prop_idle_keys_change_nothing(paused in any::<bool>(), kill_all in any::<bool>()) {
            let before = PauseState { paused, kill_all };
            prop_assert_eq!(before.apply(HotkeyState::default()), before);
        }
    }
}
