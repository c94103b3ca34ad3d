//! Provider selection and failover.
//!
//! The orchestrator owns the static provider set built at startup. Single
//! requests try the primary, then the fallback. Batches go through the
//! primary's multi-unit path and drop to the fallback one item at a time only
//! when that path fails as a whole.

use crate::config::Config;
use crate::error::{ConfigError, GenerationError};
use crate::pool::ResourcePool;
use crate::provider::{panic_message, FallbackProvider, PrimaryProvider, VideoProvider};
use crate::types::{BatchRequest, BatchResult, GeneratedVideo, GenerationRequest, GenerationResult};
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Startup view of the provider set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub primary_available: bool,
    pub fallback_available: bool,
    /// Local compute units discovered at startup
    pub units: usize,
}

pub struct Orchestrator {
    primary: Arc<dyn VideoProvider>,
    fallback: Arc<dyn VideoProvider>,
    units: usize,
}

impl Orchestrator {
    pub fn new(
        primary: Arc<dyn VideoProvider>,
        fallback: Arc<dyn VideoProvider>,
        units: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            units,
        }
    }

    /// Validate config, probe local units and build both providers.
    pub async fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let pool = ResourcePool::probe(config.primary.units, &config.primary.device_env).await;
        let units = pool.unit_count();
        let primary = PrimaryProvider::from_config(config, pool);
        let fallback = FallbackProvider::from_config(config);

        tracing::info!(
            "Providers: primary {} ({}, {units} unit(s)), fallback {} ({}, model {})",
            primary.name(),
            availability(primary.is_available()),
            fallback.name(),
            availability(fallback.is_available()),
            config.fallback.model
        );

        Ok(Self::new(Arc::new(primary), Arc::new(fallback), units))
    }

    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            primary_available: self.primary.is_available(),
            fallback_available: self.fallback.is_available(),
            units: self.units,
        }
    }

    /// Generate one video, failing over from primary to fallback.
    ///
    /// Returns `ProviderUnavailable` when neither provider is configured and
    /// `Exhausted` when every configured provider failed.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedVideo, GenerationError> {
        let mut reasons = Vec::new();

        for provider in [&self.primary, &self.fallback] {
            if !provider.is_available() {
                tracing::debug!("Skipping {} provider: not available", provider.kind());
                continue;
            }

            tracing::info!(
                "Generating '{}' with {} ({})",
                request.prompt_preview(),
                provider.kind(),
                provider.name()
            );
            match attempt(provider.as_ref(), request).await {
                GenerationResult::Success(video) => return Ok(video),
                GenerationResult::Failure { reason, .. } => {
                    tracing::warn!("{} provider failed: {reason}", provider.kind());
                    reasons.push(format!("{}: {reason}", provider.kind()));
                }
            }
        }

        if reasons.is_empty() {
            tracing::error!("No video generation provider available");
            return Err(GenerationError::unavailable(
                "none",
                "no video generation provider available",
            ));
        }
        tracing::error!("All providers failed for '{}'", request.prompt_preview());
        Err(GenerationError::Exhausted { reasons })
    }

    /// Generate a batch. The result always has one entry per request.
    pub async fn generate_batch(&self, batch: &BatchRequest) -> BatchResult {
        let n = batch.len();
        if n == 0 {
            return BatchResult::default();
        }

        let fault = if self.primary.is_available() {
            match AssertUnwindSafe(self.primary.generate_batch(&batch.requests))
                .catch_unwind()
                .await
            {
                Ok(Ok(results)) if results.len() == n => {
                    let out = BatchResult {
                        results,
                        errors: Vec::new(),
                    };
                    tracing::info!(
                        "Primary batch finished: {} succeeded, {} failed",
                        out.succeeded(),
                        out.failed()
                    );
                    return out;
                }
                Ok(Ok(results)) => GenerationError::GenerationFailed(format!(
                    "primary returned {} results for {n} requests",
                    results.len()
                )),
                Ok(Err(e)) => e,
                Err(payload) => GenerationError::GenerationFailed(panic_message(payload.as_ref())),
            }
        } else {
            GenerationError::unavailable("primary", "local backend not configured")
        };

        if !self.fallback.is_available() {
            tracing::error!("Batch of {n} failed with no fallback available: {fault}");
            return BatchResult {
                results: vec![GenerationResult::failure(self.primary.kind(), fault.clone()); n],
                errors: (1..=n).map(|i| format!("Video {i}: {fault}")).collect(),
            };
        }

        tracing::warn!("Primary batch unavailable ({fault}); generating {n} video(s) via fallback");
        self.fallback_batch(batch).await
    }

    async fn fallback_batch(&self, batch: &BatchRequest) -> BatchResult {
        let provider = self.fallback.as_ref();
        let mut out = BatchResult {
            results: Vec::with_capacity(batch.len()),
            errors: Vec::new(),
        };

        for (i, request) in batch.requests.iter().enumerate() {
            let outcome = AssertUnwindSafe(provider.generate(request))
                .catch_unwind()
                .await;
            let result = match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => GenerationResult::failure(provider.kind(), e),
                Err(payload) => GenerationResult::failure(
                    provider.kind(),
                    GenerationError::GenerationFailed(panic_message(payload.as_ref())),
                ),
            };
            if let Some(reason) = result.reason() {
                out.errors.push(format!("Video {}: {reason}", i + 1));
            }
            tracing::debug!(
                "Video {}/{}: {}",
                i + 1,
                batch.len(),
                if result.is_success() { "ok" } else { "failed" }
            );
            out.results.push(result);
        }

        tracing::info!(
            "Fallback batch finished: {} succeeded, {} failed",
            out.succeeded(),
            out.failed()
        );
        out
    }
}

/// Run one provider call, turning `Err` and panics into a failure result.
async fn attempt(provider: &dyn VideoProvider, request: &GenerationRequest) -> GenerationResult {
    match AssertUnwindSafe(provider.generate(request))
        .catch_unwind()
        .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(reason)) => GenerationResult::failure(provider.kind(), reason),
        Err(payload) => GenerationResult::failure(
            provider.kind(),
            GenerationError::GenerationFailed(panic_message(payload.as_ref())),
        ),
    }
}

fn availability(available: bool) -> &'static str {
    if available {
        "available"
    } else {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{OperationHandle, PollStatus, RemoteService};
    use crate::polling::PollingEngine;
    use crate::types::{Artifact, ProviderKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Succeed,
        /// Every item comes back as a failure result
        FailItems,
        /// `generate` and `generate_batch` return `Err`
        Error,
        Panic,
        /// Batch returns one result too few
        ShortBatch,
    }

    struct MockProvider {
        kind: ProviderKind,
        available: bool,
        behavior: Behavior,
        calls: AtomicU32,
        batch_calls: AtomicU32,
    }

    impl MockProvider {
        fn new(kind: ProviderKind, available: bool, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available,
                behavior,
                calls: AtomicU32::new(0),
                batch_calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn batch_calls(&self) -> u32 {
            self.batch_calls.load(Ordering::SeqCst)
        }

        fn one(&self, request: &GenerationRequest) -> GenerationResult {
            match self.behavior {
                Behavior::FailItems => GenerationResult::failure(
                    self.kind,
                    GenerationError::GenerationFailed("renderer exited 1".into()),
                ),
                _ => GenerationResult::success(
                    self.kind,
                    Artifact::Url(format!("{}://{}", self.kind, request.prompt())),
                ),
            }
        }
    }

    #[async_trait]
    impl VideoProvider for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Error => Err(GenerationError::GenerationFailed("backend crashed".into())),
                Behavior::Panic => panic!("provider panicked"),
                _ => Ok(self.one(request)),
            }
        }

        async fn generate_batch(
            &self,
            requests: &[GenerationRequest],
        ) -> Result<Vec<GenerationResult>, GenerationError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Error => Err(GenerationError::GenerationFailed("batch crashed".into())),
                Behavior::Panic => panic!("batch panicked"),
                Behavior::ShortBatch => {
                    Ok(requests.iter().skip(1).map(|r| self.one(r)).collect())
                }
                _ => Ok(requests.iter().map(|r| self.one(r)).collect()),
            }
        }
    }

    fn orchestrator(primary: &Arc<MockProvider>, fallback: &Arc<MockProvider>) -> Orchestrator {
        Orchestrator::new(primary.clone(), fallback.clone(), 2)
    }

    fn primary(available: bool, behavior: Behavior) -> Arc<MockProvider> {
        MockProvider::new(ProviderKind::Primary, available, behavior)
    }

    fn fallback(available: bool, behavior: Behavior) -> Arc<MockProvider> {
        MockProvider::new(ProviderKind::Fallback, available, behavior)
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest::new(prompt).unwrap()
    }

    fn batch(n: usize) -> BatchRequest {
        BatchRequest::from_prompts((0..n).map(|i| format!("p{i}")), "16:9", "720p", None).unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_never_calls_fallback() {
        let p = primary(true, Behavior::Succeed);
        let f = fallback(true, Behavior::Succeed);
        let video = orchestrator(&p, &f).generate(&request("cat")).await.unwrap();

        assert_eq!(video.provider, ProviderKind::Primary);
        assert_eq!(p.calls(), 1);
        assert_eq!(f.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        let p = primary(true, Behavior::FailItems);
        let f = fallback(true, Behavior::Succeed);
        let video = orchestrator(&p, &f).generate(&request("cat")).await.unwrap();

        assert_eq!(video.provider, ProviderKind::Fallback);
        assert_eq!(video.artifact, Artifact::Url("fallback://cat".into()));
        assert_eq!(f.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_err_and_panic_fall_back() {
        for behavior in [Behavior::Error, Behavior::Panic] {
            let p = primary(true, behavior);
            let f = fallback(true, Behavior::Succeed);
            let video = orchestrator(&p, &f).generate(&request("cat")).await.unwrap();
            assert_eq!(video.provider, ProviderKind::Fallback);
        }
    }

    #[tokio::test]
    async fn test_primary_unavailable_uses_fallback_exclusively() {
        let p = primary(false, Behavior::Succeed);
        let f = fallback(true, Behavior::Succeed);
        let orch = orchestrator(&p, &f);

        let video = orch.generate(&request("cat")).await.unwrap();
        assert_eq!(video.provider, ProviderKind::Fallback);

        let out = orch.generate_batch(&batch(3)).await;
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.provider() == ProviderKind::Fallback));
        assert!(out.errors.is_empty());

        assert_eq!(p.calls(), 0);
        assert_eq!(p.batch_calls(), 0);
        assert_eq!(f.calls(), 4);
    }

    #[tokio::test]
    async fn test_both_unavailable_is_terminal() {
        let p = primary(false, Behavior::Succeed);
        let f = fallback(false, Behavior::Succeed);
        let orch = orchestrator(&p, &f);

        let err = orch.generate(&request("cat")).await.unwrap_err();
        assert!(matches!(err, GenerationError::ProviderUnavailable { .. }));

        let out = orch.generate_batch(&batch(2)).await;
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.succeeded(), 0);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[1].starts_with("Video 2:"));
        assert_eq!(p.calls() + f.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_failed_is_exhausted() {
        let p = primary(true, Behavior::FailItems);
        let f = fallback(true, Behavior::Error);
        let err = orchestrator(&p, &f).generate(&request("cat")).await.unwrap_err();

        match err {
            GenerationError::Exhausted { reasons } => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons[0].starts_with("primary:"));
                assert!(reasons[1].contains("backend crashed"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_fallback_failed_is_exhausted() {
        let p = primary(false, Behavior::Succeed);
        let f = fallback(true, Behavior::FailItems);
        let err = orchestrator(&p, &f).generate(&request("cat")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Exhausted { ref reasons } if reasons.len() == 1));
    }

    #[tokio::test]
    async fn test_batch_primary_path_keeps_item_failures() {
        let p = primary(true, Behavior::FailItems);
        let f = fallback(true, Behavior::Succeed);
        let out = orchestrator(&p, &f).generate_batch(&batch(4)).await;

        // A batch that ran is not retried item by item.
        assert_eq!(out.results.len(), 4);
        assert_eq!(out.failed(), 4);
        assert_eq!(p.batch_calls(), 1);
        assert_eq!(f.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_whole_failure_goes_sequential_through_fallback() {
        for behavior in [Behavior::Error, Behavior::Panic, Behavior::ShortBatch] {
            let p = primary(true, behavior);
            let f = fallback(true, Behavior::Succeed);
            let out = orchestrator(&p, &f).generate_batch(&batch(5)).await;

            assert_eq!(out.results.len(), 5);
            assert_eq!(out.succeeded(), 5);
            assert_eq!(f.calls(), 5);
            assert!(out.errors.is_empty());
            for (i, result) in out.results.iter().enumerate() {
                match result {
                    GenerationResult::Success(video) => {
                        assert_eq!(video.artifact, Artifact::Url(format!("fallback://p{i}")));
                    }
                    other => panic!("expected success, got {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_fallback_batch_errors_are_recorded() {
        let p = primary(true, Behavior::Error);
        let f = fallback(true, Behavior::Error);
        let out = orchestrator(&p, &f).generate_batch(&batch(3)).await;

        assert_eq!(out.results.len(), 3);
        assert_eq!(out.failed(), 3);
        assert_eq!(
            out.errors,
            vec![
                "Video 1: Generation failed: backend crashed",
                "Video 2: Generation failed: backend crashed",
                "Video 3: Generation failed: backend crashed",
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_failure_results_are_recorded() {
        let p = primary(true, Behavior::Error);
        let f = fallback(true, Behavior::FailItems);
        let out = orchestrator(&p, &f).generate_batch(&batch(2)).await;

        assert_eq!(out.failed(), 2);
        assert_eq!(
            out.errors,
            vec![
                "Video 1: Generation failed: renderer exited 1",
                "Video 2: Generation failed: renderer exited 1",
            ]
        );
    }

    struct RejectingService;

    #[async_trait]
    impl RemoteService for RejectingService {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn submit(
            &self,
            _request: &GenerationRequest,
        ) -> Result<OperationHandle, GenerationError> {
            Err(GenerationError::UpstreamRejected {
                status: Some(400),
                message: "quota exceeded".into(),
            })
        }

        async fn poll(&self, _handle: &OperationHandle) -> Result<PollStatus, GenerationError> {
            Ok(PollStatus::Pending)
        }
    }

    #[tokio::test]
    async fn test_rejected_remote_batch_lists_every_item() {
        let p = primary(false, Behavior::Succeed);
        let f = Arc::new(FallbackProvider::new(
            Arc::new(RejectingService),
            PollingEngine::new(Duration::from_millis(1), 1),
            true,
        ));
        let out = Orchestrator::new(p.clone(), f, 0)
            .generate_batch(&batch(2))
            .await;

        assert_eq!(out.results.len(), 2);
        assert_eq!(out.failed(), 2);
        assert_eq!(out.errors.len(), out.failed());
        assert!(out.errors[1].starts_with("Video 2: "));
        assert!(out.errors[1].contains("quota exceeded"));
        assert_eq!(p.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_panic_in_batch_is_contained() {
        let p = primary(false, Behavior::Succeed);
        let f = fallback(true, Behavior::Panic);
        let out = orchestrator(&p, &f).generate_batch(&batch(2)).await;

        assert_eq!(out.results.len(), 2);
        assert_eq!(out.errors.len(), 2);
        assert!(out.errors[0].contains("provider panicked"));
    }

    #[tokio::test]
    async fn test_batch_length_matches_for_every_combination() {
        let behaviors = [
            Behavior::Succeed,
            Behavior::FailItems,
            Behavior::Error,
            Behavior::Panic,
            Behavior::ShortBatch,
        ];
        for n in [0usize, 1, 4, 7] {
            for p_avail in [true, false] {
                for f_avail in [true, false] {
                    for pb in behaviors {
                        for fb in behaviors {
                            let p = primary(p_avail, pb);
                            let f = fallback(f_avail, fb);
                            let out = orchestrator(&p, &f).generate_batch(&batch(n)).await;
                            assert_eq!(out.results.len(), n);
                        }
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_status_reports_flags_and_units() {
        let p = primary(true, Behavior::Succeed);
        let f = fallback(false, Behavior::Succeed);
        assert_eq!(
            orchestrator(&p, &f).status(),
            ProviderStatus {
                primary_available: true,
                fallback_available: false,
                units: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_from_config_builds_static_set() {
        let mut config = Config::default();
        config.primary.units = Some(3);
        let backend_dir = tempfile::tempdir().unwrap();
        config.primary.backend_dir = backend_dir.path().to_path_buf();
        config.fallback.api_key = "test-key".to_string();

        let orch = Orchestrator::from_config(&config).await.unwrap();
        let status = orch.status();
        assert_eq!(status.units, 3);
        assert!(status.fallback_available);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let mut config = Config::default();
        config.polling.max_attempts = 0;
        assert!(Orchestrator::from_config(&config).await.is_err());
    }
}
