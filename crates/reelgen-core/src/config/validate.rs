//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.aspect_ratio.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "defaults.aspect_ratio must not be empty".into(),
            ));
        }
        if self.defaults.resolution.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "defaults.resolution must not be empty".into(),
            ));
        }
        if self.primary.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "primary.program must not be empty".into(),
            ));
        }
        if self.primary.device_env.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "primary.device_env must not be empty".into(),
            ));
        }
        if self.primary.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "primary.timeout_ms must be > 0".into(),
            ));
        }
        if self.fallback.submit_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fallback.submit_timeout_ms must be > 0".into(),
            ));
        }
        if self.fallback.poll_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fallback.poll_timeout_ms must be > 0".into(),
            ));
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "polling.interval_ms must be > 0".into(),
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "polling.max_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}
