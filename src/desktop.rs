//! Windows 桌面后端
//!
//! 组合窗口、截图、模板匹配和键鼠输入，实现 [`Backend`]。
//! 所有坐标相对游戏窗口左上角；找不到窗口时退化为整个屏幕。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use image::GrayImage;
use tracing::{debug, info, warn};

use crate::keys;
use crate::runner::Backend;
use crate::screen;
use crate::vision::{self, MatchResult, Point, Rect, Size, Vision, VisionError, WindowSize};
use crate::window::GameWindow;

/// 鼠标移动后等待游戏注册新位置的时间
const CLICK_SETTLE: Duration = Duration::from_millis(500);

/// Windows 桌面后端
pub struct DesktopBackend {
    window: Option<GameWindow>,
    /// 相对模板路径的根目录
    asset_root: PathBuf,
    /// 截图保存目录（调试用）
    dump_dir: Option<PathBuf>,
    templates: HashMap<PathBuf, GrayImage>,
    origin: Point,
    size: WindowSize,
}

impl DesktopBackend {
    /// 查找窗口并激活
    pub fn connect(title: &str, asset_root: impl Into<PathBuf>) -> Self {
        let window = GameWindow::find(title);
        match &window {
            Some(w) => info!("[Desktop] 找到窗口【{}】", w.title()),
            None => warn!("[Desktop] 未找到窗口【{}】，使用整个屏幕坐标", title),
        }

        let mut backend = Self {
            window,
            asset_root: asset_root.into(),
            dump_dir: None,
            templates: HashMap::new(),
            origin: Point::default(),
            size: WindowSize::default(),
        };

        let size = backend.refresh_bounds();
        info!("窗口宽高：({}, {})", size.width, size.height);
        if let Some(w) = &backend.window {
            if !w.activate() {
                warn!("[Desktop] 激活窗口失败");
            }
        }
        backend
    }

    /// 把每次截取的区域保存到目录
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// 重新读取窗口位置；失败时沿用上次的值
    fn refresh_bounds(&mut self) -> WindowSize {
        let bounds = match &self.window {
            Some(w) => w.bounds(),
            // 全屏尺寸不会变，只截一次
            None if self.size != WindowSize::default() => return self.size,
            None => screen::capture_fullscreen()
                .map(|img| (screen::virtual_origin(), Size::new(img.width(), img.height()))),
        };
        match bounds {
            Ok((origin, size)) => {
                self.origin = origin;
                self.size = size;
            }
            Err(e) => warn!("[Desktop] 读取窗口位置失败: {:#}", e),
        }
        self.size
    }

    fn template(&mut self, asset: &Path) -> Result<&GrayImage, VisionError> {
        let path = self.asset_root.join(asset);
        if !self.templates.contains_key(&path) {
            let img = image::open(&path)
                .map_err(|source| VisionError::Template {
                    path: path.clone(),
                    source,
                })?
                .to_luma8();
            if img.width() == 0 || img.height() == 0 {
                return Err(VisionError::EmptyTemplate(path));
            }
            info!(
                "模版图片尺寸: ({}, {}), {}",
                img.width(),
                img.height(),
                path.display()
            );
            self.templates.insert(path.clone(), img);
        }
        Ok(&self.templates[&path])
    }

    fn dump(&self, asset: &Path, region: Rect, img: &GrayImage) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let stem = asset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture".to_string());
        let path = dir.join(format!("{}_cut_{}_{}.png", stem, region.x, region.y));
        if let Err(e) = screen::save_screenshot(img, &path) {
            warn!("[Desktop] {:#}", e);
        }
    }
}

impl Vision for DesktopBackend {
    fn locate(&mut self, asset: &Path, region: Rect) -> Result<MatchResult, VisionError> {
        if let Some(w) = &self.window {
            if w.is_minimized() {
                info!("窗口当前是最小化状态，自动激活窗口。");
                w.activate();
            }
        }

        let window = self.refresh_bounds();
        if !region.fits_in(window) {
            return Err(VisionError::RegionOutOfBounds { region, window });
        }
        debug!(
            "搜索区域: ({},{})-({},{})",
            region.x,
            region.y,
            region.x + region.width,
            region.y + region.height
        );

        let origin = self.origin;
        let haystack = screen::capture_region_gray(origin, region)
            .map_err(|e| VisionError::Capture(format!("{:#}", e)))?;
        self.dump(asset, region, &haystack);

        let template = self.template(asset)?;
        let start = Instant::now();
        let (x, y, confidence) = vision::best_match(&haystack, template)?;
        let size = Size::new(template.width(), template.height());
        debug!("匹配结果: ({}, {}) ncc={:.3}, 耗时: {:?}", x, y, confidence, start.elapsed());

        Ok(MatchResult {
            confidence,
            position: region.origin().offset(x as i32, y as i32),
            size,
        })
    }
}

impl Backend for DesktopBackend {
    fn window_size(&mut self) -> WindowSize {
        self.refresh_bounds()
    }

    fn keys_down(&mut self, keys: &[String]) -> bool {
        keys::all_down(keys)
    }

    fn click(&mut self, at: Point) -> Result<()> {
        let screen_at = Point::new(self.origin.x + at.x, self.origin.y + at.y);
        info!(
            "点击位置: ({}, {}) → 屏幕 ({}, {})",
            at.x, at.y, screen_at.x, screen_at.y
        );
        keys::click_at(screen_at.x, screen_at.y, CLICK_SETTLE);
        Ok(())
    }
}

/// 检查是否以管理员权限运行
pub fn is_elevated() -> bool {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token = HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }
        let mut elevation = TOKEN_ELEVATION::default();
        let mut size = 0u32;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut size,
        );
        let _ = CloseHandle(token);
        ok.is_ok() && elevation.TokenIsElevated != 0
    }
}
