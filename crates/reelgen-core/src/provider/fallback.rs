//! Remote fallback provider: submit a job, then poll it to completion.

use super::{resolve_env_var, VideoProvider};
use crate::backend::{RemoteService, VeoClient};
use crate::config::Config;
use crate::error::GenerationError;
use crate::polling::PollingEngine;
use crate::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use std::sync::Arc;

pub struct FallbackProvider {
    service: Arc<dyn RemoteService>,
    engine: PollingEngine,
    available: bool,
}

impl FallbackProvider {
    pub fn new(service: Arc<dyn RemoteService>, engine: PollingEngine, available: bool) -> Self {
        Self {
            service,
            engine,
            available,
        }
    }

    /// Build the Veo client from config.
    ///
    /// Available only when enabled and the API key resolves to a value.
    pub fn from_config(config: &Config) -> Self {
        let api_key = resolve_env_var(&config.fallback.api_key);
        let available = config.fallback.enabled && api_key.is_some();
        if config.fallback.enabled && api_key.is_none() {
            tracing::warn!("No fallback API key configured; remote generation disabled");
        }
        let client = VeoClient::from_config(&config.fallback, api_key.as_deref().unwrap_or(""));
        Self::new(
            Arc::new(client),
            PollingEngine::from_config(&config.polling),
            available,
        )
    }

    pub fn engine(&self) -> &PollingEngine {
        &self.engine
    }
}

#[async_trait]
impl VideoProvider for FallbackProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fallback
    }

    fn name(&self) -> &str {
        self.service.name()
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
                "fallback",
                "no API key configured",
            ));
        }

        let handle = match self.service.submit(request).await {
            Ok(handle) => handle,
            Err(reason) => {
                tracing::error!(
                    "{} rejected '{}': {reason}",
                    self.service.name(),
                    request.prompt_preview()
                );
                return Ok(GenerationResult::failure(ProviderKind::Fallback, reason));
            }
        };

        tracing::info!(
            "{} accepted '{}' as {handle}",
            self.service.name(),
            request.prompt_preview()
        );
        let operation = self.engine.drive(self.service.as_ref(), handle).await;
        Ok(operation.into_result(ProviderKind::Fallback))
    }
}
