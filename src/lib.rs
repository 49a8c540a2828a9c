//! zf-rust 库模块
//!
//! 挑战循环的核心逻辑与平台无关；`desktop`/`screen`/`window` 为 Windows 后端

pub mod controller;
pub mod detector;
pub mod hotkey;
pub mod keys;
pub mod logging;
pub mod profile;
pub mod runner;
pub mod vision;

#[cfg(windows)]
pub mod desktop;
#[cfg(windows)]
pub mod screen;
#[cfg(windows)]
pub mod window;
