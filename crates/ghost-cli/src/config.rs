//! Configuration file discovery and loading
//!
//! The first readable file in the search order wins:
//!
//! 1. `$GHOST_CONFIG_TOML_FILE`
//! 2. `--config <path>`
//! 3. `./.ghost/config.toml`
//! 4. `~/.ghost/config.toml`
//! 5. `<config dir>/ghost/config.toml` (`~/.config` on Linux)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use ghost_core::{LlmConfig, ToolProviderConfig};

pub const CONFIG_ENV: &str = "GHOST_CONFIG_TOML_FILE";

/// Contents of `config.toml`
#[derive(Debug, Deserialize)]
pub struct GhostConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log file; empty means the platform default
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    #[serde(default)]
    pub llms: Vec<LlmConfig>,

    #[serde(default)]
    pub mcps: Vec<ToolProviderConfig>,
}

fn default_log_level() -> String {
    "info".into()
}

impl GhostConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Find and parse the config file; returns the path that was used
    pub fn load(flag_path: Option<&Path>) -> Result<(PathBuf, Self)> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let cwd = std::env::current_dir().ok();
        let candidates = candidate_paths(
            env_path,
            flag_path.map(Path::to_path_buf),
            cwd.as_deref(),
            dirs::home_dir().as_deref(),
            dirs::config_dir().as_deref(),
        );

        for path in &candidates {
            let Ok(text) = std::fs::read_to_string(path) else {
                continue;
            };
            let config = Self::parse(&text)
                .with_context(|| format!("Failed to decode config ({})", path.display()))?;
            return Ok((path.clone(), config));
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        bail!(
            "Failed to find config file in any known location. Tried: [{}]",
            tried.join(", ")
        )
    }
}

/// Search order, most specific first; empty entries are dropped
pub fn candidate_paths(
    env_path: Option<PathBuf>,
    flag_path: Option<PathBuf>,
    cwd: Option<&Path>,
    home: Option<&Path>,
    config_dir: Option<&Path>,
) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [env_path, flag_path]
        .into_iter()
        .flatten()
        .filter(|p| !p.as_os_str().is_empty())
        .collect();

    if let Some(cwd) = cwd {
        paths.push(cwd.join(".ghost").join("config.toml"));
    }
    if let Some(home) = home {
        paths.push(home.join(".ghost").join("config.toml"));
    }
    if let Some(config_dir) = config_dir {
        let path = config_dir.join("ghost").join("config.toml");
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}
