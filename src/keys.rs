//! 键盘鼠标输入模块
//!
//! 按键名称 → 虚拟键码映射（跨平台），以及 Windows 下的按键轮询和鼠标点击。
//! 注意：某些游戏会屏蔽 SendInput 点击，点击统一使用 mouse_event (legacy) 方式

#[cfg(windows)]
use std::thread;
#[cfg(windows)]
use std::time::Duration;

#[cfg(windows)]
use windows::Win32::UI::Input::KeyboardAndMouse::{
    mouse_event, GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE,
    MOUSEEVENTF_MOVE, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
#[cfg(windows)]
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

// ===== 虚拟键码 =====
pub const VK_SPACE: u16 = 0x20;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_TAB: u16 = 0x09;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_ALT: u16 = 0x12;

// 左右区分的修饰键
pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LCONTROL: u16 = 0xA2;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_LALT: u16 = 0xA4;
pub const VK_RALT: u16 = 0xA5;

/// 从按键名称获取虚拟键码（不区分大小写）
///
/// 支持 A-Z、0-9、F1-F12 以及 `LControl`/`Ctrl`/`Shift`/`Alt` 等修饰键。
pub fn get_vk_code(key: &str) -> Option<u16> {
    let key = key.trim().to_uppercase();
    let key = key.as_str();

    // 单个字母或数字，键码与 ASCII 相同
    if key.len() == 1 {
        let c = key.as_bytes()[0];
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            return Some(c as u16);
        }
        return None;
    }

    // F1-F12 (0x70-0x7B)
    if let Some(n) = key.strip_prefix('F').and_then(|n| n.parse::<u16>().ok()) {
        return (1..=12).contains(&n).then(|| 0x6F + n);
    }

    match key {
        "SPACE" => Some(VK_SPACE),
        "ENTER" | "RETURN" => Some(VK_RETURN),
        "ESC" | "ESCAPE" => Some(VK_ESCAPE),
        "TAB" => Some(VK_TAB),
        "SHIFT" => Some(VK_SHIFT),
        "CTRL" | "CONTROL" => Some(VK_CONTROL),
        "ALT" => Some(VK_ALT),
        "LSHIFT" => Some(VK_LSHIFT),
        "RSHIFT" => Some(VK_RSHIFT),
        "LCTRL" | "LCONTROL" => Some(VK_LCONTROL),
        "RCTRL" | "RCONTROL" => Some(VK_RCONTROL),
        "LALT" => Some(VK_LALT),
        "RALT" => Some(VK_RALT),
        _ => None,
    }
}

// ===== 按键轮询 =====

/// 指定键当前是否按下
#[cfg(windows)]
pub fn is_key_down(vk: u16) -> bool {
    // 最高位为 1 表示按下
    unsafe { (GetAsyncKeyState(vk as i32) as u16 & 0x8000) != 0 }
}

/// 组合键是否全部按下；包含未知键名时返回 false
#[cfg(windows)]
pub fn all_down(keys: &[String]) -> bool {
    !keys.is_empty()
        && keys
            .iter()
            .all(|k| get_vk_code(k).is_some_and(is_key_down))
}

// ===== 鼠标操作 =====

/// 鼠标左键点击 (mouse_event 方式 - Legacy)
/// 使用更老的 mouse_event API，某些游戏只认这个
#[cfg(windows)]
pub fn left_click_legacy() {
    unsafe {
        // MOUSEEVENTF_LEFTDOWN = 0x0002, MOUSEEVENTF_LEFTUP = 0x0004
        mouse_event(MOUSE_EVENT_FLAGS(0x0002), 0, 0, 0, 0);
        thread::sleep(Duration::from_millis(10));
        mouse_event(MOUSE_EVENT_FLAGS(0x0004), 0, 0, 0, 0);
    }
}

/// 移动鼠标到指定屏幕坐标
#[cfg(windows)]
pub fn move_to(x: i32, y: i32) {
    let (screen_width, screen_height) =
        unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    if screen_width <= 0 || screen_height <= 0 {
        return;
    }

    // 转换为绝对坐标 (0-65535)
    let abs_x = (x * 65535) / screen_width;
    let abs_y = (y * 65535) / screen_height;

    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: abs_x,
                dy: abs_y,
                mouseData: 0,
                dwFlags: MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };

    unsafe {
        SendInput(&[input], std::mem::size_of::<INPUT>() as i32);
    }
}

/// 移动鼠标并点击
/// 移动后等待一段时间，让游戏注册新的鼠标位置
#[cfg(windows)]
pub fn click_at(x: i32, y: i32, settle: Duration) {
    move_to(x, y);
    thread::sleep(settle);
    left_click_legacy();
}
