//! File logging. The terminal belongs to the conversation, so log records go
//! to `~/.jarvis/jarvis.YYYY-MM-DD.log` instead of stderr. A new file is
//! started each day and the last week of files is kept.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Environment variable holding the log filter, e.g. `JARVIS_LOG=jarvis=debug`.
pub const FILTER_ENV: &str = "JARVIS_LOG";

const KEEP_DAYS: usize = 7;

/// Install the global subscriber; returns the log directory.
pub fn init() -> Result<PathBuf> {
    let dir = AppConfig::config_dir()?;
    init_in(&dir)?;
    Ok(dir)
}

fn init_in(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("jarvis")
        .filename_suffix("log")
        .max_log_files(KEEP_DAYS)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
