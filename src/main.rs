//! zf-rust: 神器传说 阵法自动挑战
//!
//! 命令行程序：
//! - run：按配置循环检测并点击（默认）
//! - probe：单次模板匹配，用于校准区域
//! - init-profile：导出内置配置

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use zf_rust::logging;
use zf_rust::profile::Profile;

#[derive(Parser)]
#[command(name = "zf-rust")]
#[command(version)]
#[command(about = "神器传说 阵法自动挑战")]
struct Cli {
    /// 配置文件（JSON），不指定时使用内置配置
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// 覆盖配置中的窗口标题
    #[arg(short, long, global = true)]
    window: Option<String>,

    /// 输出 debug 日志
    #[arg(long, global = true)]
    debug: bool,

    /// 日志目录（按天滚动）
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[cfg_attr(not(windows), allow(dead_code))]
enum Command {
    /// 开始自动挑战（默认暂停，LControl+S 开始）
    Run {
        /// 启动后直接运行，不等待热键
        #[arg(long)]
        start: bool,

        /// 开启全部挑战：不在最后一局时退出
        #[arg(long)]
        kill_all: bool,

        /// 保存每次截取的区域到目录
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },

    /// 在指定区域内查找一次模板
    Probe {
        /// 模板图片路径
        asset: PathBuf,

        #[arg(long, default_value_t = 0)]
        x: i32,

        #[arg(long, default_value_t = 0)]
        y: i32,

        /// 区域宽度，默认到窗口右边
        #[arg(long)]
        width: Option<i32>,

        /// 区域高度，默认到窗口底部
        #[arg(long)]
        height: Option<i32>,
    },

    /// 导出内置配置到文件
    InitProfile {
        /// 输出路径
        out: PathBuf,
    },
}

/// 加载配置，返回配置和模板根目录
fn load_profile(path: Option<&Path>, window: Option<String>) -> Result<(Profile, PathBuf)> {
    let (mut profile, asset_root) = match path {
        Some(path) => {
            let profile = Profile::load(path)?;
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            info!("[Profile] 已加载 {} ({})", profile.name, path.display());
            (profile, root)
        }
        None => (Profile::builtin(), PathBuf::from(".")),
    };

    if let Some(title) = window {
        profile.window_title = title;
    }
    profile.validate()?;
    Ok((profile, asset_root))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.debug, cli.log_dir.as_deref())?;

    let command = cli.command.unwrap_or(Command::Run {
        start: false,
        kill_all: false,
        dump_dir: None,
    });

    if let Command::InitProfile { out } = &command {
        Profile::builtin()
            .save(out)
            .with_context(|| format!("导出配置失败: {}", out.display()))?;
        info!("[Profile] 内置配置已导出: {}", out.display());
        return Ok(());
    }

    let (profile, asset_root) = load_profile(cli.profile.as_deref(), cli.window)?;
    desktop_main(command, profile, asset_root)
}

#[cfg(windows)]
fn desktop_main(command: Command, profile: Profile, asset_root: PathBuf) -> Result<()> {
    use tracing::warn;
    use zf_rust::controller::{Context as LoopContext, Controller};
    use zf_rust::desktop::{is_elevated, DesktopBackend};
    use zf_rust::hotkey::PauseState;
    use zf_rust::runner::{Backend, Runner};
    use zf_rust::vision::{Rect, Vision};

    if !is_elevated() {
        warn!("[Main] 未以管理员权限运行，游戏可能忽略模拟点击");
    }

    let mut backend = DesktopBackend::connect(&profile.window_title, asset_root);

    match command {
        Command::Run {
            start,
            kill_all,
            dump_dir,
        } => {
            if let Some(dir) = &dump_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("创建截图目录失败: {}", dir.display()))?;
            }
            let backend = backend.with_dump_dir(dump_dir);
            let context = LoopContext {
                pause: PauseState {
                    paused: !start,
                    kill_all,
                },
                ..LoopContext::default()
            };

            let reason = Runner::new(Controller::new(profile), backend)
                .starting_with(context)
                .run();
            info!("[Main] 运行结束: {}", reason);
            Ok(())
        }
        Command::Probe {
            asset,
            x,
            y,
            width,
            height,
        } => {
            let window = backend.window_size();
            let region = Rect::new(
                x,
                y,
                width.unwrap_or(window.width as i32 - x),
                height.unwrap_or(window.height as i32 - y),
            );
            let hit = backend.locate(&asset, region)?;
            let verdict = if hit.confidence > profile.threshold {
                "找到"
            } else {
                "未找到"
            };
            println!(
                "{}: {} | 置信度 {:.3} (阈值 {}) | 位置 ({}, {}) | 中心 ({}, {})",
                asset.display(),
                verdict,
                hit.confidence,
                profile.threshold,
                hit.position.x,
                hit.position.y,
                hit.center().x,
                hit.center().y
            );
            Ok(())
        }
        Command::InitProfile { .. } => Ok(()),
    }
}

#[cfg(not(windows))]
fn desktop_main(_command: Command, _profile: Profile, _asset_root: PathBuf) -> Result<()> {
    anyhow::bail!("桌面后端仅支持 Windows")
}
