//! Configuration types for Lantern.
//!
//! Loaded from `config.toml` in [`lantern_dirs::config_dir`](crate::lantern_dirs::config_dir).
//! Every field has a default, so a missing file or a partial file is fine.

use crate::error::{LanternError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default update-check endpoint.
pub const DEFAULT_CHECK_URL: &str = "https://lantern.app/api/update";

/// Well-known installer filename consumed by the installer launcher.
pub const DEFAULT_INSTALLER_NAME: &str = "LanternSetup.exe";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanternConfig {
    /// Update lifecycle settings.
    pub update: UpdateConfig,
    /// System tray settings.
    pub tray: TrayConfig,
}

/// Update check, download and install settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Base URL of the update-check endpoint.
    pub check_url: String,
    /// Version reported to the endpoint. Defaults to the crate version.
    pub version: Option<String>,
    /// Staging directory override. Defaults to `data_dir()/updates`.
    pub stage_dir: Option<PathBuf>,
    /// Installer filename looked up in the staging directory at upgrade time.
    pub installer_name: String,
    /// Delay before the first check after startup.
    pub warmup_secs: u64,
    /// Delay between checks.
    pub interval_secs: u64,
    /// TCP connect timeout for update requests.
    pub connect_timeout_secs: u64,
    /// Read timeout for update requests (covers the installer download).
    pub download_timeout_secs: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_url: DEFAULT_CHECK_URL.to_owned(),
            version: None,
            stage_dir: None,
            installer_name: DEFAULT_INSTALLER_NAME.to_owned(),
            warmup_secs: 5,
            interval_secs: 60 * 60,
            connect_timeout_secs: 15,
            download_timeout_secs: 300,
        }
    }
}

impl UpdateConfig {
    /// Running version reported to the update endpoint.
    pub fn running_version(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned())
    }

    /// Resolved staging directory.
    pub fn resolved_stage_dir(&self) -> PathBuf {
        self.stage_dir
            .clone()
            .unwrap_or_else(crate::lantern_dirs::update_stage_dir)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// System tray settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    /// Tooltip shown when hovering the tray icon.
    pub tooltip: String,
    /// Page opened for the "Get started" action.
    pub getting_started_url: String,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            tooltip: "Lantern".to_owned(),
            getting_started_url: "https://lantern.app/getting-started".to_owned(),
        }
    }
}

impl LanternConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LanternError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LanternError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::lantern_dirs::config_dir().join("config.toml")
    }

    /// Load from `path`, or return defaults when the file is missing or invalid.
    pub fn load_or_default(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring invalid config at {}: {e}", path.display());
                Self::default()
            }
        }
    }
}
