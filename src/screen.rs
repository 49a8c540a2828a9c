//! 屏幕截图模块
//!
//! 使用 win-screenshot 截取整个虚拟桌面，再裁剪到窗口内的搜索区域。
//! 虚拟桌面的左上角不一定是 (0, 0)：主屏左侧或上方还有显示器时为负值，
//! 裁剪前需要把屏幕坐标换算成截图内坐标。

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GrayImage, RgbaImage};
use tracing::info;
use win_screenshot::prelude::*;
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

use crate::vision::{Point, Rect};

/// 截取全屏（RGBA）
pub fn capture_fullscreen() -> Result<RgbaImage> {
    let buf = capture_display().map_err(|e| anyhow!("截取屏幕失败: {:?}", e))?;

    RgbaImage::from_raw(buf.width, buf.height, buf.pixels).context("无法创建图像缓冲区")
}

/// 虚拟桌面左上角的屏幕坐标
pub fn virtual_origin() -> Point {
    unsafe {
        Point::new(
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
        )
    }
}

/// 屏幕坐标 → 截图内坐标
fn to_capture(screen_pos: Point, desktop: Point) -> Point {
    Point::new(screen_pos.x - desktop.x, screen_pos.y - desktop.y)
}

/// 截取窗口内指定区域并转为灰度
///
/// # Arguments
/// * `origin` - 窗口左上角的屏幕坐标
/// * `region` - 相对窗口的搜索区域
pub fn capture_region_gray(origin: Point, region: Rect) -> Result<GrayImage> {
    let screen = capture_fullscreen()?;

    let Point { x, y } = to_capture(
        Point::new(origin.x + region.x, origin.y + region.y),
        virtual_origin(),
    );
    if x < 0
        || y < 0
        || x as u32 + region.width as u32 > screen.width()
        || y as u32 + region.height as u32 > screen.height()
    {
        anyhow::bail!(
            "搜索区域超出屏幕: ({}, {}) {}x{}，屏幕 {}x{}",
            x,
            y,
            region.width,
            region.height,
            screen.width(),
            screen.height()
        );
    }

    let cropped = DynamicImage::ImageRgba8(screen).crop_imm(
        x as u32,
        y as u32,
        region.width as u32,
        region.height as u32,
    );

    Ok(cropped.to_luma8())
}

/// 保存截图到文件（用于调试）
pub fn save_screenshot(img: &GrayImage, path: &Path) -> Result<()> {
    img.save(path)
        .with_context(|| format!("保存截图失败: {}", path.display()))?;
    info!("[Screen] 截图已保存: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_capture_primary_only() {
        let at = to_capture(Point::new(427, 1396), Point::new(0, 0));
        assert_eq!(at, Point::new(427, 1396));
    }

    #[test]
    fn test_to_capture_monitor_left_and_above() {
        // 主屏左侧 1920 宽、上方 200 高的副屏
        let at = to_capture(Point::new(427, 1396), Point::new(-1920, -200));
        assert_eq!(at, Point::new(2347, 1596));
    }
}
