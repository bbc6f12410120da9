//! Configuration management for photoprep.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section is optional in the file.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for photoprep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage roots
    pub storage: StorageConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.photoprep.photoprep/config.toml
    /// - Linux: ~/.config/photoprep/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\photoprep\config\config.toml
    ///
    /// Falls back to ~/.photoprep/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "photoprep", "photoprep")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".photoprep").join("config.toml")
            })
    }

    /// Public pictures root (with ~ expansion).
    pub fn pictures_dir(&self) -> PathBuf {
        expand(&self.storage.pictures_dir)
    }

    /// Permanent gallery root (with ~ expansion).
    pub fn gallery_dir(&self) -> PathBuf {
        expand(&self.storage.gallery_dir)
    }

    /// App-scoped pictures directory (with ~ expansion).
    pub fn private_dir(&self) -> PathBuf {
        expand(&self.storage.private_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.copy_buffer_kb, 64);
        assert_eq!(config.limits.max_file_size_mb, 100);
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[storage]"));
        assert!(toml.contains("[limits]"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\npictures_dir = \"/srv/pictures\"\n\n[limits]\nmax_file_size_mb = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.pictures_dir(), PathBuf::from("/srv/pictures"));
        assert_eq!(config.limits.max_file_size_mb, 5);
        assert_eq!(config.storage.copy_buffer_kb, 64);
    }

    #[test]
    fn test_tilde_expansion() {
        let mut config = Config::default();
        config.storage.gallery_dir = PathBuf::from("~/DCIM");
        assert!(!config.gallery_dir().to_string_lossy().starts_with('~'));
    }
}
