//! Configuration management for reelgen.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`, so a missing file or a
//! partial file both work.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for reelgen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Request defaults
    pub defaults: DefaultsConfig,

    /// Local renderer settings
    pub primary: PrimaryConfig,

    /// Remote fallback settings
    pub fallback: FallbackConfig,

    /// Remote operation polling budget
    pub polling: PollingConfig,

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
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.reelgen.reelgen/config.toml
    /// - Linux: ~/.config/reelgen/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\reelgen\config\config.toml
    ///
    /// Falls back to ~/.reelgen/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "reelgen", "reelgen")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".reelgen").join("config.toml")
            })
    }

    /// Resolved backend directory: `OVI_PATH` wins, then config, with ~ expansion.
    pub fn backend_dir(&self) -> PathBuf {
        let raw = std::env::var("OVI_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.primary.backend_dir.to_string_lossy().into_owned());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
