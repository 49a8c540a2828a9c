//! 挑战配置（Profile）
//!
//! 声明式描述所有标识：模板图片、搜索区域、置信度阈值、点击偏移。
//! 内置配置与 `profiles/zhenfa.json` 相同，也可从 JSON 文件加载。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::get_vk_code;
use crate::vision::{MatchResult, Point, Rect, WindowSize};

/// 默认窗口标题
pub const DEFAULT_WINDOW_TITLE: &str = "神器传说";

/// 配置错误
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("读取配置文件失败: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("序列化配置失败")]
    Serialize(#[from] serde_json::Error),

    #[error("配置中没有任何标识")]
    NoFlags,

    #[error("轮询间隔不能为 0")]
    ZeroInterval,

    #[error("【{name}】置信度阈值 {value} 不在 [0, 1] 范围内")]
    Threshold { name: String, value: f32 },

    #[error("【{name}】搜索区域宽高必须为正数")]
    EmptyRegion { name: String },

    #[error("【{name}】窗口比例分母不能为 0")]
    ZeroDenominator { name: String },

    #[error("热键 {hotkey} 没有配置按键")]
    EmptyHotkey { hotkey: &'static str },

    #[error("热键 {hotkey} 包含未知按键: {key}")]
    UnknownKey { hotkey: &'static str, key: String },
}

// ===== 区域 =====

/// 窗口轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Width,
    Height,
}

/// 区域的一个维度：固定像素，或窗口宽/高的比例
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Px(i32),
    Window {
        of: Axis,
        #[serde(default = "one")]
        num: u32,
        #[serde(default = "one")]
        den: u32,
    },
}

fn one() -> u32 {
    1
}

impl Dim {
    /// 窗口宽/高的 num/den
    pub const fn window(of: Axis, num: u32, den: u32) -> Self {
        Self::Window { of, num, den }
    }

    /// 按当前窗口尺寸求值（浮点计算后截断）
    pub fn resolve(&self, window: WindowSize) -> i32 {
        match *self {
            Dim::Px(v) => v,
            Dim::Window { of, num, den } => {
                if den == 0 {
                    return 0;
                }
                let base = match of {
                    Axis::Width => window.width,
                    Axis::Height => window.height,
                } as f64;
                (base / den as f64 * num as f64) as i32
            }
        }
    }
}

/// 搜索区域描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub x: Dim,
    pub y: Dim,
    pub width: Dim,
    pub height: Dim,
}

impl RegionSpec {
    /// 固定像素区域
    pub const fn fixed(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x: Dim::Px(x),
            y: Dim::Px(y),
            width: Dim::Px(width),
            height: Dim::Px(height),
        }
    }

    pub fn resolve(&self, window: WindowSize) -> Rect {
        Rect::new(
            self.x.resolve(window),
            self.y.resolve(window),
            self.width.resolve(window),
            self.height.resolve(window),
        )
    }

    fn dims(&self) -> [Dim; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

// ===== 点击 =====

/// 匹配成功后的点击位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClickAt {
    /// 匹配位置（左上角）加固定偏移
    Offset { dx: i32, dy: i32 },
    /// 匹配区域中心
    Center,
}

impl ClickAt {
    pub fn resolve(&self, hit: &MatchResult) -> Point {
        match *self {
            ClickAt::Offset { dx, dy } => hit.position.offset(dx, dy),
            ClickAt::Center => hit.center(),
        }
    }
}

// ===== 标识 =====

/// 单次模板查找
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    /// 模板图片路径
    pub asset: PathBuf,
    pub region: RegionSpec,
    /// 覆盖全局阈值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    /// 匹配后点击的位置，None 表示不点击
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickAt>,
}

impl Probe {
    pub fn new(asset: impl Into<PathBuf>, region: RegionSpec) -> Self {
        Self {
            asset: asset.into(),
            region,
            threshold: None,
            click: None,
        }
    }

    pub fn click(mut self, at: ClickAt) -> Self {
        self.click = Some(at);
        self
    }
}

/// 主标识命中后的附加动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FollowUp {
    /// 找到则点击
    Click { probe: Probe },
    /// 依次尝试，点击第一个找到的
    FirstOf { options: Vec<Probe> },
}

/// 标识对计数器的作用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagRole {
    /// 继续挑战：计数 +1，受上限和最后一局检查约束
    Continue,
    /// 胜利/失败/难度提示：计数清零
    Reset,
}

/// 一个界面标识
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSpec {
    pub name: String,
    pub role: FlagRole,
    pub probe: Probe,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<FollowUp>,
}

/// 热键组合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeySpec {
    /// 恢复运行
    pub resume: Vec<String>,
    /// 恢复运行并开启全部挑战
    pub resume_kill_all: Vec<String>,
    /// 暂停
    pub pause: Vec<String>,
}

impl Default for HotkeySpec {
    fn default() -> Self {
        let combo = |key: &str| vec!["LControl".to_string(), key.to_string()];
        Self {
            resume: combo("S"),
            resume_kill_all: combo("D"),
            pause: combo("A"),
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// 每次检查前的等待（毫秒）
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// 全局置信度阈值，超过即视为找到
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// 连续继续挑战的上限，超过后退出
    #[serde(default = "default_max_challenges")]
    pub max_challenges: u32,
    #[serde(default)]
    pub hotkeys: HotkeySpec,
    /// 奖励宝箱标识：找不到说明是最后一局
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<Probe>,
    /// 按顺序检查的标识
    pub flags: Vec<FlagSpec>,
}

fn default_window_title() -> String {
    DEFAULT_WINDOW_TITLE.to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_threshold() -> f32 {
    0.8
}

fn default_max_challenges() -> u32 {
    5
}

impl Default for Profile {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Profile {
    /// 阵法挑战的内置配置
    pub fn builtin() -> Self {
        use Axis::{Height, Width};

        let bottom_third = RegionSpec {
            x: Dim::Px(0),
            y: Dim::window(Height, 2, 3),
            width: Dim::window(Width, 1, 1),
            height: Dim::window(Height, 1, 3),
        };
        let bottom_half = RegionSpec {
            x: Dim::Px(0),
            y: Dim::window(Height, 1, 2),
            width: Dim::window(Width, 1, 1),
            height: Dim::window(Height, 1, 2),
        };
        let close_prompt = FollowUp::Click {
            probe: Probe::new("assets/click_anywhere_close.png", bottom_third)
                .click(ClickAt::Offset { dx: 400, dy: 200 }),
        };
        let at_match = ClickAt::Offset { dx: 0, dy: 0 };

        Self {
            name: "阵法".to_string(),
            window_title: default_window_title(),
            interval_ms: default_interval_ms(),
            threshold: default_threshold(),
            max_challenges: default_max_challenges(),
            hotkeys: HotkeySpec::default(),
            end_marker: Some(Probe::new(
                "assets/zhenfa_jiangli_box.png",
                RegionSpec::fixed(699, 1041, 110, 110),
            )),
            flags: vec![
                FlagSpec {
                    name: "继续挑战".to_string(),
                    role: FlagRole::Continue,
                    probe: Probe::new(
                        "assets/zhenfa_jxtz.png",
                        RegionSpec::fixed(427, 1396, 390, 235),
                    )
                    .click(ClickAt::Offset { dx: 120, dy: 43 }),
                    follow_ups: Vec::new(),
                },
                FlagSpec {
                    name: "胜利".to_string(),
                    role: FlagRole::Reset,
                    probe: Probe::new("assets/tzcg.png", RegionSpec::fixed(227, 474, 508, 273)),
                    follow_ups: vec![close_prompt.clone()],
                },
                FlagSpec {
                    name: "失败".to_string(),
                    role: FlagRole::Reset,
                    probe: Probe::new("assets/tzsb.png", RegionSpec::fixed(227, 474, 508, 273)),
                    follow_ups: vec![close_prompt],
                },
                FlagSpec {
                    name: "阵法难度提示".to_string(),
                    role: FlagRole::Reset,
                    probe: Probe::new(
                        "assets/zhenfa_nandu_tishi.png",
                        RegionSpec {
                            x: Dim::Px(0),
                            y: Dim::Px(350),
                            width: Dim::window(Width, 1, 1),
                            height: Dim::Px(200),
                        },
                    ),
                    follow_ups: vec![
                        FollowUp::FirstOf {
                            options: vec![
                                Probe::new("assets/zhenfa_zise_jiangli_da.png", bottom_half)
                                    .click(at_match),
                                Probe::new("assets/zhenfa_zise_jiangli.png", bottom_half)
                                    .click(at_match),
                            ],
                        },
                        FollowUp::Click {
                            probe: Probe::new("assets/zhenfa_nandu_xuanze.png", bottom_half)
                                .click(ClickAt::Center),
                        },
                    ],
                },
            ],
        }
    }

    /// 从 JSON 文件加载并校验
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Profile =
            serde_json::from_str(&content).map_err(|source| ProfileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        profile.validate()?;
        Ok(profile)
    }

    /// 保存到 JSON 文件
    pub fn save(&self, path: &Path) -> Result<(), ProfileError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.flags.is_empty() {
            return Err(ProfileError::NoFlags);
        }
        if self.interval_ms == 0 {
            return Err(ProfileError::ZeroInterval);
        }
        check_threshold(&self.name, Some(self.threshold))?;

        for (hotkey, keys) in [
            ("resume", &self.hotkeys.resume),
            ("resume_kill_all", &self.hotkeys.resume_kill_all),
            ("pause", &self.hotkeys.pause),
        ] {
            if keys.is_empty() {
                return Err(ProfileError::EmptyHotkey { hotkey });
            }
            if let Some(key) = keys.iter().find(|k| get_vk_code(k).is_none()) {
                return Err(ProfileError::UnknownKey {
                    hotkey,
                    key: key.clone(),
                });
            }
        }

        if let Some(marker) = &self.end_marker {
            check_probe("最后一局", marker)?;
        }
        for flag in &self.flags {
            for probe in flag.probes() {
                check_probe(&flag.name, probe)?;
            }
        }
        Ok(())
    }
}

impl FlagSpec {
    /// 主标识及所有附加动作里的查找
    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        std::iter::once(&self.probe).chain(self.follow_ups.iter().flat_map(|f| match f {
            FollowUp::Click { probe } => std::slice::from_ref(probe),
            FollowUp::FirstOf { options } => options.as_slice(),
        }))
    }
}

fn check_threshold(name: &str, value: Option<f32>) -> Result<(), ProfileError> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ProfileError::Threshold {
            name: name.to_string(),
            value: v,
        }),
        _ => Ok(()),
    }
}

fn check_probe(name: &str, probe: &Probe) -> Result<(), ProfileError> {
    check_threshold(name, probe.threshold)?;

    let dims = probe.region.dims();
    if dims
        .iter()
        .any(|d| matches!(d, Dim::Window { den: 0, .. }))
    {
        return Err(ProfileError::ZeroDenominator {
            name: name.to_string(),
        });
    }
    let empty = |d: &Dim| matches!(d, Dim::Px(v) if *v <= 0) || matches!(d, Dim::Window { num: 0, .. });
    if empty(&probe.region.width) || empty(&probe.region.height) {
        return Err(ProfileError::EmptyRegion {
            name: name.to_string(),
        });
    }
    Ok(())
}
