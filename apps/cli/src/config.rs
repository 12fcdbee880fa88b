//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/formbatch/cli.toml` or `~/.config/formbatch/cli.toml`
//! - Windows: `%APPDATA%/formbatch/cli.toml`

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use formbatch_protocol::constants::DEFAULT_API_URL;
use formbatch_transfer::{DEFAULT_MAX_CONCURRENT, MAX_CONCURRENT, MIN_CONCURRENT};
use formbatch_upload::{STALENESS_HORIZON, UploadSettings};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base URL of the form service API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Files uploaded concurrently per chunk.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Directory for upload session snapshots. Empty means next to the
    /// config file.
    #[serde(default)]
    pub session_dir: String,

    /// Minutes after which an interrupted session is discarded.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: i64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_staleness_minutes() -> i64 {
    STALENESS_HORIZON.num_minutes()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            max_concurrent: default_max_concurrent(),
            session_dir: String::new(),
            staleness_minutes: default_staleness_minutes(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = CliConfig::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Directory holding upload session snapshots.
    pub fn session_dir(&self) -> anyhow::Result<PathBuf> {
        if !self.session_dir.trim().is_empty() {
            return Ok(PathBuf::from(self.session_dir.trim()));
        }
        let path = config_path()?;
        Ok(path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Library-side settings, clamped to supported ranges.
    pub fn upload_settings(&self) -> UploadSettings {
        let minutes = self.staleness_minutes.max(1);
        UploadSettings {
            max_concurrent: self.max_concurrent.clamp(MIN_CONCURRENT, MAX_CONCURRENT),
            staleness_horizon: TimeDelta::try_minutes(minutes).unwrap_or(STALENESS_HORIZON),
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("formbatch").join("cli.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("formbatch").join("cli.toml"))
    }
}
