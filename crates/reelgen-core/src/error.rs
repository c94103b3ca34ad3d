//! Error types for the reelgen generation core.
//!
//! Provider faults are carried as [`GenerationError`] values inside
//! `GenerationResult::Failure` rather than propagated, so the taxonomy is
//! `Clone` and each variant renders a human-readable reason.

use thiserror::Error;

/// Top-level error type for reelgen operations.
#[derive(Error, Debug)]
pub enum ReelError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generation errors that escaped every provider
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Generation faults, shared by both providers and the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No credential or backend configured for the provider
    #[error("{provider} provider unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The backend ran but produced no usable artifact
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A status query failed; retried silently while budget remains
    #[error("Transient poll failure: {0}")]
    TransientPollFailure(String),

    /// Poll budget or invocation deadline exhausted
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The remote service answered with an error
    #[error("Upstream rejected request{}: {message}", status_suffix(.status))]
    UpstreamRejected {
        status: Option<u16>,
        message: String,
    },

    /// A compute unit failed as a whole (device lost, out of memory)
    #[error("Compute unit {unit} failed: {message}")]
    UnitFault { unit: usize, message: String },

    /// The request was rejected before any provider saw it
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every available provider was tried and failed
    #[error("All providers failed: {}", .reasons.join("; "))]
    Exhausted { reasons: Vec<String> },
}

impl GenerationError {
    /// Shorthand for an unavailable-provider error.
    pub fn unavailable(provider: &str, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Whether this fault takes down a whole compute unit rather than one item.
    pub fn is_unit_fault(&self) -> bool {
        matches!(self, Self::UnitFault { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

/// Convenience type alias for reelgen results.
pub type Result<T> = std::result::Result<T, ReelError>;

/// Convenience type alias for generation-specific results.
pub type GenerationOutcome<T> = std::result::Result<T, GenerationError>;
