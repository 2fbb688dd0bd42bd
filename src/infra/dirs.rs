//! Platform-specific directory management
//!
//! Environment variables can override default directories:
//! - `LITHOS_CONFIG_DIR` - Override config directory
//! - `LITHOS_MOUNT_ROOT` - Override where temporary mount directories go

use std::env;
use std::path::PathBuf;

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "LITHOS_CONFIG_DIR";
pub const ENV_MOUNT_ROOT: &str = "LITHOS_MOUNT_ROOT";

/// Application name used in directory paths
const APP_NAME: &str = "lithos";

/// Settings file name inside the config directory
const SETTINGS_FILE: &str = "config.toml";

/// Platform-specific directory provider for lithos
#[derive(Debug, Clone)]
pub struct LithosDirs {
    config_dir: PathBuf,
    mount_root: PathBuf,
}

impl LithosDirs {
    /// Resolve directories, checking environment variables first
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
            mount_root: Self::resolve_mount_root(),
        }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/lithos` or `~/.config/lithos`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the settings file path
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Default parent for temporary mount directories
    ///
    /// `$XDG_RUNTIME_DIR` when set, the system temp dir otherwise.
    #[must_use]
    pub fn mount_root(&self) -> PathBuf {
        self.mount_root.clone()
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                // Fallback to home directory
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }

    fn resolve_mount_root() -> PathBuf {
        if let Ok(path) = env::var(ENV_MOUNT_ROOT) {
            return PathBuf::from(path);
        }

        dirs::runtime_dir().unwrap_or_else(env::temp_dir)
    }
}

impl Default for LithosDirs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_new_creates_instance() {
        let dirs = LithosDirs::new();
        assert!(!dirs.config_dir().as_os_str().is_empty());
        assert!(!dirs.mount_root().as_os_str().is_empty());
    }

    #[test]
    fn test_settings_path_is_under_config_dir() {
        let dirs = LithosDirs::new();
        assert!(dirs.settings_path().starts_with(dirs.config_dir()));
        assert!(dirs.settings_path().ends_with("config.toml"));
    }
}
