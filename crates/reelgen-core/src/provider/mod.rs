//! Video provider trait and provider construction.
//!
//! Defines the interface both providers implement, plus the helpers that
//! build them from config once at startup.

pub(crate) mod fallback;
pub(crate) mod primary;

pub use fallback::FallbackProvider;
pub use primary::PrimaryProvider;

use crate::error::GenerationError;
use crate::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use std::any::Any;

/// Trait that every video provider implements.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the orchestrator holds `Arc<dyn VideoProvider>`).
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Which role this provider plays.
    fn kind(&self) -> ProviderKind;

    /// Backend name for logging (e.g., "ovi", "veo").
    fn name(&self) -> &str;

    /// Whether the provider was configured at startup. Constant for the
    /// process lifetime.
    fn is_available(&self) -> bool;

    /// Generate one video.
    ///
    /// Faults during generation come back as `GenerationResult::Failure`.
    /// `Err` is reserved for faults before any job is attempted, such as an
    /// unavailable provider.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResult, GenerationError>;

    /// Generate a batch, one result per request in request order.
    ///
    /// The default runs [`generate`](Self::generate) sequentially. `Err` means
    /// the batch could not run at all.
    async fn generate_batch(
        &self,
        requests: &[GenerationRequest],
    ) -> Result<Vec<GenerationResult>, GenerationError> {
        if !self.is_available() {
            return Err(GenerationError::unavailable(
                self.name(),
                "provider not configured",
            ));
        }
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match self.generate(request).await {
                Ok(result) => result,
                Err(e) => GenerationResult::failure(self.kind(), e),
            };
            results.push(result);
        }
        Ok(results)
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Readable text for a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}
