//! File log sink
//!
//! The terminal belongs to the conversation, so all tracing output goes to
//! a file. `RUST_LOG` overrides the configured level.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "ghost.log";

/// Platform log location: `~/Library/Logs/ghost` on macOS, the state (or
/// cache) dir elsewhere
pub fn default_log_file() -> Option<PathBuf> {
    let dir = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Logs").join("ghost"))
    } else {
        dirs::state_dir()
            .or_else(dirs::cache_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
            .map(|base| base.join("ghost").join("logs"))
    };
    dir.map(|d| d.join(LOG_FILE_NAME))
}

/// Check a configured level name (`error` through `trace`)
pub fn parse_level(level: &str) -> Result<tracing::Level> {
    level
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid log level: {level}"))
}

/// Install the global subscriber; keep the guard alive until exit
pub fn init(configured_path: Option<&Path>, level: &str) -> Result<(PathBuf, WorkerGuard)> {
    let level = parse_level(level)?;
    let path = match configured_path.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => path.to_path_buf(),
        None => default_log_file().context("failed to determine log file path")?,
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("log path has no file name: {}", path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install logger: {e}"))?;

    tracing::info!(level = %level, path = %path.display(), "Logger initialized");
    Ok((path, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(parse_level("debug").unwrap(), tracing::Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), tracing::Level::WARN);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_default_file_name() {
        if let Some(path) = default_log_file() {
            assert_eq!(path.file_name().unwrap(), LOG_FILE_NAME);
            assert!(path.to_string_lossy().contains("ghost"));
        }
    }
}
