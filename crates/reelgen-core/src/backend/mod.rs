//! Seams between the providers and the things that actually make video.
//!
//! [`LocalBackend`] renders on this machine and returns a file path;
//! [`RemoteService`] accepts a job and is polled until it finishes. Both are
//! traits so providers can be exercised against in-memory fakes.

pub(crate) mod local;
pub(crate) mod remote;

pub use local::CommandBackend;
pub use remote::VeoClient;

use crate::error::GenerationError;
use crate::pool::ExecutionContext;
use crate::types::GenerationRequest;
use async_trait::async_trait;
use std::path::PathBuf;

/// Produces a video file on local hardware.
#[async_trait]
pub trait LocalBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Render one request on the device selected by `context`.
    ///
    /// Returns the path of the produced video. A `UnitFault` error means the
    /// device itself is unusable, not just this request.
    async fn render(
        &self,
        request: &GenerationRequest,
        context: &ExecutionContext,
    ) -> Result<PathBuf, GenerationError>;
}

/// Opaque token naming a job accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What one status query reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Job still running
    Pending,
    /// Job finished; `None` when the result carried no video
    Complete { artifact_url: Option<String> },
    /// Job finished with an error reported by the service
    Rejected { message: String },
}

/// A remote long-running video job service.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// Submit a job, returning its handle.
    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, GenerationError>;

    /// Query a job's status once.
    async fn poll(&self, handle: &OperationHandle) -> Result<PollStatus, GenerationError>;
}
