//! Reelgen Core - Video generation orchestration library.
//!
//! Reelgen turns text prompts into short videos. A local multi-GPU renderer is
//! the primary provider; a remote long-running-operation service is the
//! fallback when the renderer is missing or fails.
//!
//! # Architecture
//!
//! ```text
//! Request → Orchestrator → PrimaryProvider (ResourcePool → LocalBackend)
//!                        ↘ FallbackProvider (RemoteService → PollingEngine)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use reelgen_core::{Config, GenerationRequest, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> reelgen_core::Result<()> {
//!     let config = Config::load()?;
//!     let orchestrator = Orchestrator::from_config(&config).await?;
//!
//!     let request = GenerationRequest::new("a paper boat drifting down a gutter")?;
//!     let video = orchestrator.generate(&request).await?;
//!     println!("Generated by {}", video.provider);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod backend;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod polling;
pub mod pool;
pub mod provider;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, GenerationError, GenerationOutcome, ReelError, Result};
pub use orchestrator::{Orchestrator, ProviderStatus};
pub use output::{BatchReport, OutputFormat, OutputWriter, VideoRecord};
pub use polling::{OperationStatus, PollingEngine, RemoteOperation};
pub use pool::{partition, ExecutionContext, ResourcePool};
pub use provider::{FallbackProvider, PrimaryProvider, VideoProvider};
pub use types::{
    Artifact, BatchRequest, BatchResult, GeneratedVideo, GenerationRequest, GenerationResult,
    ProviderKind,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
