//! On-disk configuration for the pikaqfs binary
//!
//! Stored as `config.toml` in the config directory, `~/.config/pikaqfs` by
//! default. Every key is optional; a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "pikaqfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Also write logs to a daily-rolling file here
    pub log_dir: Option<PathBuf>,
    pub allow_other: bool,
    pub auto_unmount: bool,
    /// Mount data used when `mount` is run without `-o`
    pub mount_options: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            allow_other: false,
            auto_unmount: true,
            mount_options: String::new(),
        }
    }
}

impl Config {
    /// Resolve the config directory, preferring an explicit override
    pub fn config_dir(custom: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        match custom {
            Some(dir) => Ok(dir),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_NAME))
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    pub fn config_file(custom: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir(custom)?.join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn load_from(custom: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load(&Self::config_file(custom)?)
    }

    /// Write to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    #[cfg(feature = "fuse")]
    pub fn mount_manager_config(&self) -> crate::fuse::MountManagerConfig {
        crate::fuse::MountManagerConfig {
            allow_other: self.allow_other,
            auto_unmount: self.auto_unmount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.auto_unmount);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = Config {
            log_level: "debug".to_string(),
            log_dir: Some(dir.path().join("logs")),
            allow_other: true,
            auto_unmount: false,
            mount_options: "max_nodes=16,legacy_dir_mode".to_string(),
        };

        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "mount_options = \"max_nodes=8\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.mount_options, "max_nodes=8");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "allow_other = \"maybe\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_dir_override() {
        let dir = PathBuf::from("/tmp/pikaqfs-test");
        assert_eq!(
            Config::config_file(Some(dir.clone())).unwrap(),
            dir.join(CONFIG_FILE_NAME)
        );
    }
}
