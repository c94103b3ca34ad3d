//! The `reelgen status` command.

use reelgen_core::{Config, Orchestrator, ProviderStatus};
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    status: &'static str,
    version: &'static str,
    #[serde(flatten)]
    providers: ProviderStatus,
}

impl StatusReport {
    fn new(providers: ProviderStatus) -> Self {
        let status = if providers.primary_available || providers.fallback_available {
            "healthy"
        } else {
            "unavailable"
        };
        Self {
            status,
            version: reelgen_core::VERSION,
            providers,
        }
    }
}

/// Execute the status command.
pub async fn execute(config: &Config) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config).await?;
    let report = StatusReport::new(orchestrator.status());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
