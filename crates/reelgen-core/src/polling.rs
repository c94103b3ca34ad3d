//! Drives a remote long-running operation to a terminal state.
//!
//! The engine waits a fixed interval before every status query and gives up
//! after a fixed number of queries, so the worst-case wall clock for one job
//! is `max_attempts * interval` plus query latency.

use std::time::Duration;

use crate::backend::{OperationHandle, PollStatus, RemoteService};
use crate::config::PollingConfig;
use crate::error::GenerationError;
use crate::types::{Artifact, GenerationResult, ProviderKind};

/// Lifecycle of a remote job as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done,
    Failed,
    /// Synthetic terminal state: the query budget ran out first
    BudgetExhausted,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::Pending)
    }
}

/// State of one remote job for the lifetime of its polling.
#[derive(Debug, Clone)]
pub struct RemoteOperation {
    handle: OperationHandle,
    status: OperationStatus,
    attempts: u32,
    artifact_url: Option<String>,
    failure: Option<GenerationError>,
}

impl RemoteOperation {
    /// A freshly accepted job: `Pending`, zero attempts.
    pub fn accepted(handle: OperationHandle) -> Self {
        Self {
            handle,
            status: OperationStatus::Pending,
            attempts: 0,
            artifact_url: None,
            failure: None,
        }
    }

    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Number of status queries made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn artifact_url(&self) -> Option<&str> {
        self.artifact_url.as_deref()
    }

    /// Apply one query outcome. Only valid while `Pending`.
    fn record(&mut self, outcome: Result<PollStatus, GenerationError>) {
        debug_assert!(!self.status.is_terminal());
        self.attempts += 1;
        match outcome {
            Err(e) => {
                tracing::warn!(
                    "Poll {} for {} failed, will retry: {e}",
                    self.attempts,
                    self.handle
                );
            }
            Ok(PollStatus::Pending) => {
                tracing::debug!("Poll {}: {} still pending", self.attempts, self.handle);
            }
            Ok(PollStatus::Complete {
                artifact_url: Some(url),
            }) => {
                self.status = OperationStatus::Done;
                self.artifact_url = Some(url);
            }
            Ok(PollStatus::Complete { artifact_url: None }) => {
                self.status = OperationStatus::Failed;
                self.failure = Some(GenerationError::GenerationFailed(
                    "operation completed without a video".to_string(),
                ));
            }
            Ok(PollStatus::Rejected { message }) => {
                self.status = OperationStatus::Failed;
                self.failure = Some(GenerationError::UpstreamRejected {
                    status: None,
                    message,
                });
            }
        }
    }

    fn exhaust(&mut self) {
        self.status = OperationStatus::BudgetExhausted;
        self.failure = Some(GenerationError::Timeout(format!(
            "operation {} not finished after {} polls",
            self.handle, self.attempts
        )));
    }

    /// Convert a terminal operation into a result for `provider`.
    pub fn into_result(self, provider: ProviderKind) -> GenerationResult {
        match (self.status, self.artifact_url, self.failure) {
            (OperationStatus::Done, Some(url), _) => {
                GenerationResult::success(provider, Artifact::Url(url))
            }
            (_, _, Some(reason)) => GenerationResult::failure(provider, reason),
            (status, _, None) => GenerationResult::failure(
                provider,
                GenerationError::GenerationFailed(format!(
                    "operation left in non-terminal state {status:?}"
                )),
            ),
        }
    }
}

/// Fixed-interval, bounded-attempt poller.
#[derive(Debug, Clone)]
pub struct PollingEngine {
    interval: Duration,
    max_attempts: u32,
}

impl PollingEngine {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(Duration::from_millis(config.interval_ms), config.max_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Upper bound on time spent sleeping between queries.
    pub fn worst_case(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Poll `handle` until it reaches a terminal state or the budget runs out.
    ///
    /// Query failures are transient: they consume an attempt and polling
    /// continues. The returned operation is always terminal.
    pub async fn drive(
        &self,
        service: &dyn RemoteService,
        handle: OperationHandle,
    ) -> RemoteOperation {
        let mut operation = RemoteOperation::accepted(handle);

        while operation.attempts < self.max_attempts {
            tokio::time::sleep(self.interval).await;
            let outcome = service.poll(&operation.handle).await;
            operation.record(outcome);
            if operation.status.is_terminal() {
                tracing::debug!(
                    "Operation {} finished as {:?} after {} poll(s)",
                    operation.handle,
                    operation.status,
                    operation.attempts
                );
                return operation;
            }
        }

        tracing::error!(
            "Operation {} timed out after {} polls",
            operation.handle,
            operation.attempts
        );
        operation.exhaust();
        operation
    }
}
