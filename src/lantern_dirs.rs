//! Centralized application directory paths for Lantern.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | Windows | Linux |
//! |---------|---------|-------|
//! | App data | `%LOCALAPPDATA%\Lantern\` | `~/.local/share/lantern/` |
//! | Config | `%APPDATA%\Lantern\` | `~/.config/lantern/` |
//!
//! # Environment Overrides
//!
//! - `LANTERN_DATA_DIR` overrides [`data_dir`]
//! - `LANTERN_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

#[cfg(target_os = "windows")]
const APP_DIR_NAME: &str = "Lantern";
#[cfg(not(target_os = "windows"))]
const APP_DIR_NAME: &str = "lantern";

/// Application data root directory.
///
/// Holds logs and staged updates. Resolves to `dirs::data_local_dir()/Lantern/`
/// by default. Override with the `LANTERN_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LANTERN_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join("lantern-data"))
}

/// Application config directory.
///
/// Used for `config.toml` and `identity.json`. Override with the
/// `LANTERN_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LANTERN_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join("lantern-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Staging directory for downloaded installers (`data_dir()/updates/`).
#[must_use]
pub fn update_stage_dir() -> PathBuf {
    data_dir().join("updates")
}

/// Installation identity file (`config_dir()/identity.json`).
#[must_use]
pub fn identity_file() -> PathBuf {
    config_dir().join("identity.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_dir_is_under_data_dir() {
        assert!(logs_dir().starts_with(data_dir()));
        assert!(logs_dir().ends_with("logs"));
    }

    #[test]
    fn update_stage_dir_is_under_data_dir() {
        assert!(update_stage_dir().starts_with(data_dir()));
        assert!(update_stage_dir().ends_with("updates"));
    }

    #[test]
    fn identity_file_is_json_in_config_dir() {
        let path = identity_file();
        assert!(path.starts_with(config_dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    }
}
