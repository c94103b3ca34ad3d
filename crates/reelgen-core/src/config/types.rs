//! Sub-configuration structs with defaults matching the deployed service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request defaults applied when the caller leaves a field unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Aspect ratio ("16:9", "9:16", ...)
    pub aspect_ratio: String,

    /// Resolution ("720p", "1080p", ...)
    pub resolution: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: crate::types::DEFAULT_ASPECT_RATIO.to_string(),
            resolution: crate::types::DEFAULT_RESOLUTION.to_string(),
        }
    }
}

/// Local renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Whether the local renderer may be used at all
    pub enabled: bool,

    /// Directory holding the model checkout; `OVI_PATH` overrides it
    pub backend_dir: PathBuf,

    /// Program to launch for one generation
    pub program: String,

    /// Arguments placed before the per-request flags
    pub args: Vec<String>,

    /// Number of compute units; probed with nvidia-smi when unset
    pub units: Option<usize>,

    /// Environment variable that pins a child process to one device
    pub device_env: String,

    /// Per-invocation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend_dir: PathBuf::from("/app/ovi"),
            program: "python".to_string(),
            args: vec!["-m".to_string(), "ovi.generate".to_string()],
            units: None,
            device_env: "CUDA_VISIBLE_DEVICES".to_string(),
            timeout_ms: 1_800_000,
        }
    }
}

/// Remote video service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether the remote service may be used at all
    pub enabled: bool,

    /// API base URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Timeout for the job submission request in milliseconds
    pub submit_timeout_ms: u64,

    /// Timeout for each status query in milliseconds
    pub poll_timeout_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "veo-3.1-fast-generate-preview".to_string(),
            api_key: "${GEMINI_API_KEY}".to_string(),
            submit_timeout_ms: 300_000,
            poll_timeout_ms: 30_000,
        }
    }
}

/// Remote operation polling budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed wait before each status query in milliseconds
    pub interval_ms: u64,

    /// Maximum number of status queries before declaring a timeout
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_attempts: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
