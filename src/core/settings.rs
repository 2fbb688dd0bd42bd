//! Global settings
//!
//! Reads `config.toml` from the config directory. Settings hold the default
//! mount root and sector size used while provisioning, a table of disk
//! aliases, and output preferences.
//!
//! ```toml
//! [provision]
//! mount_root = "/run/lithos"
//!
//! [aliases]
//! system-disk = "/dev/nvme0n1"
//!
//! [output]
//! quiet = true
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::dirs::LithosDirs;

/// Settings error types
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse settings file
    #[error("Failed to parse settings file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global settings for lithos
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Provisioning defaults
    #[serde(default)]
    pub provision: ProvisionSettings,

    /// Alias name to device path
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Output preferences
    #[serde(default)]
    pub output: OutputSettings,
}

/// Provisioning defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionSettings {
    /// Where temporary mount directories are created
    pub mount_root: Option<PathBuf>,

    /// Sector size to plan with instead of querying the device
    pub sector_size: Option<u32>,
}

/// Output preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    /// Enable quiet mode
    pub quiet: Option<bool>,

    /// Enable JSON output
    pub json: Option<bool>,
}

impl Settings {
    /// Load settings from the config directory
    ///
    /// A missing file yields defaults; an unreadable or invalid one is an
    /// error.
    pub fn load(dirs: &LithosDirs) -> Result<Self, SettingsError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Effective mount root
    #[must_use]
    pub fn mount_root(&self, dirs: &LithosDirs) -> PathBuf {
        self.provision
            .mount_root
            .clone()
            .unwrap_or_else(|| dirs.mount_root())
    }

    /// Aliases from the settings file overlaid with `overrides`
    #[must_use]
    pub fn merged_aliases(&self, overrides: &[(String, String)]) -> HashMap<String, String> {
        let mut aliases = self.aliases.clone();
        for (alias, device) in overrides {
            aliases.insert(alias.clone(), device.clone());
        }
        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_valid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[provision]
mount_root = "/run/lithos"
sector_size = 4096

[aliases]
main = "/dev/nvme0n1"
"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(
            settings.provision.mount_root,
            Some(PathBuf::from("/run/lithos"))
        );
        assert_eq!(settings.provision.sector_size, Some(4096));
        assert_eq!(settings.aliases["main"], "/dev/nvme0n1");
        assert!(settings.output.json.is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "invalid toml [[[").unwrap();
        assert!(matches!(
            Settings::load_from_path(&path),
            Err(SettingsError::ParseError { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[provision]\nmount_rot = \"/tmp\"\n").unwrap();
        assert!(Settings::load_from_path(&path).is_err());
    }

    #[test]
    fn test_cli_aliases_override_settings() {
        let mut settings = Settings::default();
        settings
            .aliases
            .insert("main".to_string(), "/dev/sda".to_string());
        settings
            .aliases
            .insert("data".to_string(), "/dev/sdb".to_string());

        let merged = settings.merged_aliases(&[("main".to_string(), "/dev/vda".to_string())]);
        assert_eq!(merged["main"], "/dev/vda");
        assert_eq!(merged["data"], "/dev/sdb");
    }
}
