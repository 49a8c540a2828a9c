//! 模板匹配模块
//!
//! 坐标类型、匹配结果，以及基于零均值归一化互相关 (NCC) 的模板匹配。
//! 匹配结果一次性返回置信度和位置，不依赖任何全局状态。

use std::path::{Path, PathBuf};

use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{match_template_parallel, MatchTemplateMethod};
use thiserror::Error;

/// 窗口内坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 平移
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// 宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 窗口尺寸（像素）
pub type WindowSize = Size;

/// 搜索区域 (x, y, w, h)，相对窗口左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// 区域是否完整落在窗口内
    pub fn fits_in(&self, window: WindowSize) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && (self.x + self.width) as i64 <= window.width as i64
            && (self.y + self.height) as i64 <= window.height as i64
    }
}

/// 一次模板匹配的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// 置信度 [0, 1]
    pub confidence: f32,
    /// 匹配位置（模板左上角，窗口坐标）
    pub position: Point,
    /// 模板尺寸
    pub size: Size,
}

impl MatchResult {
    /// 匹配区域中心点
    pub fn center(&self) -> Point {
        self.position
            .offset(self.size.width as i32 / 2, self.size.height as i32 / 2)
    }
}

/// 模板匹配相关错误
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("打开模版文件失败: {path}")]
    Template {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("设置的搜索区域小于模版尺寸: 区域 {region_width}x{region_height}, 模版 {template_width}x{template_height}")]
    RegionSmallerThanTemplate {
        region_width: u32,
        region_height: u32,
        template_width: u32,
        template_height: u32,
    },

    #[error("设置的搜索区域超过窗口区域: {region:?}, 窗口 {window:?}")]
    RegionOutOfBounds { region: Rect, window: WindowSize },

    #[error("模版图片为空: {0}")]
    EmptyTemplate(PathBuf),

    #[error("截取屏幕失败: {0}")]
    Capture(String),
}

/// 模板匹配服务
///
/// 在窗口的指定区域内查找模板图片，返回最佳匹配。
pub trait Vision {
    fn locate(&mut self, asset: &Path, region: Rect) -> Result<MatchResult, VisionError>;
}

/// 达到该置信度即视为命中，不再继续扫描
pub const EARLY_ACCEPT: f32 = 0.95;

/// 在 `haystack` 中查找 `template` 的最佳位置
///
/// 返回 (x, y, 置信度)，坐标相对 `haystack` 左上角。
/// 置信度为零均值 NCC，负相关截断为 0。互相关项按行并行计算，
/// 逐行扫描时遇到超过 [`EARLY_ACCEPT`] 的位置立即返回。
pub fn best_match(haystack: &GrayImage, template: &GrayImage) -> Result<(u32, u32, f32), VisionError> {
    let (hw, hh) = haystack.dimensions();
    let (tw, th) = template.dimensions();

    if tw > hw || th > hh {
        return Err(VisionError::RegionSmallerThanTemplate {
            region_width: hw,
            region_height: hh,
            template_width: tw,
            template_height: th,
        });
    }

    let n = (tw as u64 * th as u64) as f64;

    // 模板统计量
    let (t_sum, t_sq) = template.pixels().fold((0u64, 0u64), |(s, q), p| {
        let v = p[0] as u64;
        (s + v, q + v * v)
    });
    let t_mean = t_sum as f64 / n;
    let t_var = t_sq as f64 / n - t_mean * t_mean;
    if t_var <= f64::EPSILON {
        // 纯色模板没有相关性可言
        return Ok((0, 0, 0.0));
    }
    let t_std = t_var.sqrt();

    let cross = match_template_parallel(haystack, template, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, u64>(haystack);
    let squares = integral_squared_image::<_, u64>(haystack);

    let mut best = (0u32, 0u32, 0.0f32);
    let mut best_score = f64::NEG_INFINITY;

    for y in 0..=(hh - th) {
        for x in 0..=(hw - tw) {
            let (right, bottom) = (x + tw - 1, y + th - 1);
            let i_sum = sum_image_pixels(&sums, x, y, right, bottom)[0] as f64;
            let i_sq = sum_image_pixels(&squares, x, y, right, bottom)[0] as f64;
            let i_mean = i_sum / n;
            let i_var = i_sq / n - i_mean * i_mean;
            let score = if i_var <= f64::EPSILON {
                0.0
            } else {
                let sum_it = cross.get_pixel(x, y)[0] as f64;
                (sum_it - t_mean * i_sum) / (n * i_var.sqrt() * t_std)
            };

            if score > best_score {
                best_score = score;
                best = (x, y, score.clamp(0.0, 1.0) as f32);
                if best.2 > EARLY_ACCEPT {
                    return Ok(best);
                }
            }
        }
    }

    Ok(best)
}
