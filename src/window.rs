//! 游戏窗口
//!
//! 按标题查找窗口、读取位置尺寸、激活到前台

use anyhow::Result;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, GetWindowRect, IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use crate::vision::{Point, Size};

/// 将 Rust 字符串转换为 Windows 宽字符串
pub fn to_wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// 已找到的游戏窗口
#[derive(Debug, Clone)]
pub struct GameWindow {
    hwnd: HWND,
    title: String,
}

impl GameWindow {
    /// 按完整标题查找窗口
    pub fn find(title: &str) -> Option<Self> {
        let wide = to_wide_string(title);
        unsafe {
            match FindWindowW(None, PCWSTR(wide.as_ptr())) {
                Ok(hwnd) if !hwnd.0.is_null() => Some(Self {
                    hwnd,
                    title: title.to_string(),
                }),
                _ => None,
            }
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 窗口左上角屏幕坐标和尺寸
    pub fn bounds(&self) -> Result<(Point, Size)> {
        let mut rect = RECT::default();
        unsafe {
            GetWindowRect(self.hwnd, &mut rect)?;
        }
        let width = (rect.right - rect.left).max(0) as u32;
        let height = (rect.bottom - rect.top).max(0) as u32;
        Ok((Point::new(rect.left, rect.top), Size::new(width, height)))
    }

    pub fn is_minimized(&self) -> bool {
        unsafe { IsIconic(self.hwnd).as_bool() }
    }

    /// 激活窗口（最小化时先还原）
    pub fn activate(&self) -> bool {
        unsafe {
            if self.is_minimized() {
                let _ = ShowWindow(self.hwnd, SW_RESTORE);
            }
            SetForegroundWindow(self.hwnd).as_bool()
        }
    }
}
