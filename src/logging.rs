//! 日志初始化
//!
//! 控制台输出，可选按天滚动写入文件。`RUST_LOG` 优先于 `--debug`。

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志文件前缀
const LOG_PREFIX: &str = "zf-rust.log";

/// 初始化日志
///
/// # Arguments
/// * `debug` - 默认级别为 debug（否则 info）
/// * `log_dir` - 日志目录，None 时只输出到控制台
///
/// # Returns
/// 写文件时返回的 guard 需要保持到程序结束
pub fn init(debug: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let console = tracing_subscriber::fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("创建日志目录失败: {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_PREFIX));

            tracing_subscriber::registry()
                .with(filter())
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .try_init()
                .context("日志已初始化")?;

            tracing::info!("[Log] 日志目录: {}", dir.display());
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter())
                .with(console)
                .try_init()
                .context("日志已初始化")?;
            Ok(None)
        }
    }
}
