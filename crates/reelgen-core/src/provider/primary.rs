//! Local multi-GPU provider.
//!
//! Single requests render on the inherited device. Batches are split into
//! contiguous groups, one per compute unit, and the groups run concurrently
//! while each unit works through its own group in order.

use super::{panic_message, VideoProvider};
use crate::backend::{CommandBackend, LocalBackend};
use crate::config::Config;
use crate::error::GenerationError;
use crate::pool::{partition, ExecutionContext, ResourcePool};
use crate::types::{Artifact, GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub struct PrimaryProvider {
    backend: Arc<dyn LocalBackend>,
    pool: ResourcePool,
    available: bool,
}

impl PrimaryProvider {
    pub fn new(backend: Arc<dyn LocalBackend>, pool: ResourcePool, available: bool) -> Self {
        Self {
            backend,
            pool,
            available,
        }
    }

    /// Build the command-line renderer from config.
    ///
    /// Available only when enabled and the backend directory exists.
    pub fn from_config(config: &Config, pool: ResourcePool) -> Self {
        let backend_dir = config.backend_dir();
        let available = config.primary.enabled && backend_dir.is_dir();
        if config.primary.enabled && !available {
            tracing::warn!(
                "Primary backend directory {} not found; local generation disabled",
                backend_dir.display()
            );
        }
        let backend = CommandBackend::from_config(&config.primary, &backend_dir);
        Self::new(Arc::new(backend), pool, available)
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Render one request and load the produced file into memory.
    async fn render_item(
        &self,
        request: &GenerationRequest,
        context: &ExecutionContext,
    ) -> Result<Artifact, GenerationError> {
        let path = self.backend.render(request, context).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            GenerationError::GenerationFailed(format!(
                "failed to read rendered video {}: {e}",
                path.display()
            ))
        })?;
        tracing::debug!(
            "Rendered {} bytes for '{}' from {}",
            bytes.len(),
            request.prompt_preview(),
            path.display()
        );
        Ok(Artifact::Inline(bytes))
    }

    fn to_result(outcome: Result<Artifact, GenerationError>) -> GenerationResult {
        match outcome {
            Ok(artifact) => GenerationResult::success(ProviderKind::Primary, artifact),
            Err(reason) => GenerationResult::failure(ProviderKind::Primary, reason),
        }
    }

    async fn run_sequential(&self, requests: &[GenerationRequest]) -> Vec<GenerationResult> {
        let context = self.pool.default_context();
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(Self::to_result(self.render_item(request, &context).await));
        }
        results
    }

    /// Run one unit's group in order while holding that unit.
    ///
    /// A unit fault abandons the rest of the group and fails every item in it.
    async fn run_group(&self, unit: usize, group: &[GenerationRequest]) -> Vec<GenerationResult> {
        let outcome = self
            .pool
            .with_unit(unit, |context| async move {
                let mut results = Vec::with_capacity(group.len());
                for request in group {
                    match self.render_item(request, &context).await {
                        // The whole group fails, including items this unit already
                        // rendered; their artifacts are not reported.
                        Err(fault) if fault.is_unit_fault() => return Err(fault),
                        outcome => results.push(Self::to_result(outcome)),
                    }
                }
                Ok(results)
            })
            .await;

        match outcome {
            Some(Ok(results)) => results,
            Some(Err(fault)) => {
                tracing::error!(
                    "Unit {unit} failed, marking its {} request(s) failed: {fault}",
                    group.len()
                );
                fail_all(group.len(), fault)
            }
            None => fail_all(
                group.len(),
                GenerationError::UnitFault {
                    unit,
                    message: "unit is not in the pool".to_string(),
                },
            ),
        }
    }

    async fn run_distributed(
        &self,
        requests: &[GenerationRequest],
        units: usize,
    ) -> Vec<GenerationResult> {
        let groups = partition(requests.len(), units)
            .into_iter()
            .enumerate()
            .filter(|(_, range)| !range.is_empty())
            .map(|(unit, range)| {
                let group = &requests[range];
                tracing::info!("Unit {unit}: {} request(s)", group.len());
                async move {
                    match AssertUnwindSafe(self.run_group(unit, group))
                        .catch_unwind()
                        .await
                    {
                        Ok(results) => results,
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            tracing::error!("Unit {unit} panicked: {message}");
                            fail_all(group.len(), GenerationError::UnitFault { unit, message })
                        }
                    }
                }
            });

        join_all(groups).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl VideoProvider for PrimaryProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }

    fn name(&self) -> &str {
        self.backend.name()
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        if !self.available {
            return Err(GenerationError::unavailable(
                "primary",
                "local backend not configured",
            ));
        }
        let context = self.pool.default_context();
        Ok(Self::to_result(self.render_item(request, &context).await))
    }

    async fn generate_batch(
        &self,
        requests: &[GenerationRequest],
    ) -> Result<Vec<GenerationResult>, GenerationError> {
        if !self.available {
            return Err(GenerationError::unavailable(
                "primary",
                "local backend not configured",
            ));
        }

        let units = self.pool.unit_count();
        if units <= 1 {
            tracing::info!(
                "Generating {} video(s) sequentially ({units} unit(s))",
                requests.len()
            );
            return Ok(self.run_sequential(requests).await);
        }

        tracing::info!(
            "Distributing {} video(s) across {units} units",
            requests.len()
        );
        Ok(self.run_distributed(requests, units).await)
    }
}

fn fail_all(count: usize, reason: GenerationError) -> Vec<GenerationResult> {
    vec![GenerationResult::failure(ProviderKind::Primary, reason); count]
}
