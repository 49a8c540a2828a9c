//! 标识检测
//!
//! 所有标识共用一个检测函数：查找主模板，命中后依次执行附加查找，
//! 收集需要点击的位置。检测本身不修改计数器。

use tracing::{debug, info, warn};

use crate::profile::{FlagSpec, FollowUp, Probe};
use crate::vision::{MatchResult, Point, Vision, WindowSize};

/// 一次检测的结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Detection {
    pub matched: bool,
    /// 按顺序执行的点击（窗口坐标）
    pub clicks: Vec<Point>,
}

/// 执行一次查找，置信度超过阈值时返回匹配结果
///
/// 匹配服务报错（模板缺失、区域越界等）按未找到处理。
pub fn probe(
    probe: &Probe,
    vision: &mut dyn Vision,
    window: WindowSize,
    threshold: f32,
) -> Option<MatchResult> {
    let region = probe.region.resolve(window);
    let threshold = probe.threshold.unwrap_or(threshold);

    match vision.locate(&probe.asset, region) {
        Ok(hit) => {
            debug!(
                "[Detector] {} 置信度 {:.3} 位置 ({}, {})",
                probe.asset.display(),
                hit.confidence,
                hit.position.x,
                hit.position.y
            );
            (hit.confidence > threshold).then_some(hit)
        }
        Err(e) => {
            warn!("[Detector] 模板匹配失败 {}: {}", probe.asset.display(), e);
            None
        }
    }
}

/// 检测一个标识
pub fn detect(
    flag: &FlagSpec,
    vision: &mut dyn Vision,
    window: WindowSize,
    threshold: f32,
) -> Detection {
    info!("查找【{}】标识", flag.name);

    let Some(hit) = probe(&flag.probe, vision, window, threshold) else {
        info!("【{}】标志位置查找失败", flag.name);
        return Detection::default();
    };

    let mut clicks = Vec::new();
    match flag.probe.click {
        Some(at) => {
            let point = at.resolve(&hit);
            info!(
                "【{}】标志位置（{}, {}), 并点击 ({}, {})",
                flag.name, hit.position.x, hit.position.y, point.x, point.y
            );
            clicks.push(point);
        }
        None => info!(
            "【{}】标志位置（{}, {})",
            flag.name, hit.position.x, hit.position.y
        ),
    }

    for follow_up in &flag.follow_ups {
        let options = match follow_up {
            FollowUp::Click { probe } => std::slice::from_ref(probe),
            FollowUp::FirstOf { options } => options.as_slice(),
        };
        if let Some(point) = first_click(options, vision, window, threshold) {
            clicks.push(point);
        }
    }

    Detection {
        matched: true,
        clicks,
    }
}

/// 依次查找，返回第一个命中项的点击位置
fn first_click(
    options: &[Probe],
    vision: &mut dyn Vision,
    window: WindowSize,
    threshold: f32,
) -> Option<Point> {
    for option in options {
        if let Some(hit) = probe(option, vision, window, threshold) {
            let at = option.click?;
            return Some(at.resolve(&hit));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::profile::Profile;
    use crate::vision::{Rect, Size, VisionError};

    const WINDOW: WindowSize = Size::new(1080, 2400);

    /// 按模板名返回固定结果的匹配服务
    #[derive(Default)]
    struct FixedVision {
        hits: HashMap<PathBuf, (f32, Point)>,
        calls: Vec<(PathBuf, Rect)>,
    }

    impl FixedVision {
        fn with(mut self, asset: &str, confidence: f32, x: i32, y: i32) -> Self {
            self.hits
                .insert(PathBuf::from(asset), (confidence, Point::new(x, y)));
            self
        }
    }

    impl Vision for FixedVision {
        fn locate(&mut self, asset: &Path, region: Rect) -> Result<MatchResult, VisionError> {
            self.calls.push((asset.to_path_buf(), region));
            let (confidence, position) = self
                .hits
                .get(asset)
                .copied()
                .ok_or_else(|| VisionError::EmptyTemplate(asset.to_path_buf()))?;
            Ok(MatchResult {
                confidence,
                position,
                size: Size::new(100, 40),
            })
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let profile = Profile::builtin();
        let flag = &profile.flags[0];

        let mut vision = FixedVision::default().with("assets/zhenfa_jxtz.png", 0.8, 500, 1450);
        assert!(!detect(flag, &mut vision, WINDOW, 0.8).matched);

        let mut vision = FixedVision::default().with("assets/zhenfa_jxtz.png", 0.81, 500, 1450);
        let detection = detect(flag, &mut vision, WINDOW, 0.8);
        assert!(detection.matched);
        assert_eq!(detection.clicks, vec![Point::new(620, 1493)]);
    }

    #[test]
    fn test_backend_error_is_a_miss() {
        let profile = Profile::builtin();
        let mut vision = FixedVision::default();
        let detection = detect(&profile.flags[1], &mut vision, WINDOW, 0.8);
        assert_eq!(detection, Detection::default());
        // 主模板未命中时不执行附加查找
        assert_eq!(vision.calls.len(), 1);
    }

    #[test]
    fn test_victory_clicks_close_prompt() {
        let profile = Profile::builtin();
        let mut vision = FixedVision::default()
            .with("assets/tzcg.png", 0.9, 300, 500)
            .with("assets/click_anywhere_close.png", 0.9, 10, 1700);

        let detection = detect(&profile.flags[1], &mut vision, WINDOW, 0.8);
        assert!(detection.matched);
        assert_eq!(detection.clicks, vec![Point::new(410, 1900)]);
        assert_eq!(
            vision.calls[1],
            (
                PathBuf::from("assets/click_anywhere_close.png"),
                Rect::new(0, 1600, 1080, 800)
            )
        );
    }

    #[test]
    fn test_victory_without_close_prompt_still_matches() {
        let profile = Profile::builtin();
        let mut vision = FixedVision::default()
            .with("assets/tzcg.png", 0.9, 300, 500)
            .with("assets/click_anywhere_close.png", 0.2, 10, 1700);

        let detection = detect(&profile.flags[1], &mut vision, WINDOW, 0.8);
        assert!(detection.matched);
        assert!(detection.clicks.is_empty());
    }

    #[test]
    fn test_difficulty_prefers_large_reward() {
        let profile = Profile::builtin();
        let mut vision = FixedVision::default()
            .with("assets/zhenfa_nandu_tishi.png", 0.9, 100, 400)
            .with("assets/zhenfa_zise_jiangli_da.png", 0.9, 200, 1300)
            .with("assets/zhenfa_zise_jiangli.png", 0.9, 600, 1300)
            .with("assets/zhenfa_nandu_xuanze.png", 0.9, 400, 2000);

        let detection = detect(&profile.flags[3], &mut vision, WINDOW, 0.8);
        assert_eq!(
            detection.clicks,
            vec![Point::new(200, 1300), Point::new(450, 2020)]
        );
        let assets: Vec<_> = vision.calls.iter().map(|(a, _)| a.clone()).collect();
        assert!(!assets.contains(&PathBuf::from("assets/zhenfa_zise_jiangli.png")));
    }

    #[test]
    fn test_difficulty_falls_back_to_small_reward() {
        let profile = Profile::builtin();
        let mut vision = FixedVision::default()
            .with("assets/zhenfa_nandu_tishi.png", 0.9, 100, 400)
            .with("assets/zhenfa_zise_jiangli_da.png", 0.3, 200, 1300)
            .with("assets/zhenfa_zise_jiangli.png", 0.9, 600, 1300)
            .with("assets/zhenfa_nandu_xuanze.png", 0.1, 400, 2000);

        let detection = detect(&profile.flags[3], &mut vision, WINDOW, 0.8);
        assert!(detection.matched);
        assert_eq!(detection.clicks, vec![Point::new(600, 1300)]);
    }

    #[test]
    fn test_probe_threshold_override() {
        let mut probe = Profile::builtin().flags[0].probe.clone();
        probe.threshold = Some(0.95);
        let mut vision = FixedVision::default().with("assets/zhenfa_jxtz.png", 0.9, 0, 0);
        assert!(super::probe(&probe, &mut vision, WINDOW, 0.8).is_none());
    }
}
