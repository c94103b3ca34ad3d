//! Command implementations and helpers they share.

pub mod batch;
pub mod config;
pub mod generate;
pub mod status;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for reelgen_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => reelgen_core::OutputFormat::Json,
            OutputFormat::Jsonl => reelgen_core::OutputFormat::JsonLines,
        }
    }
}

/// Spinner on stderr while a generation runs.
pub(crate) fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Await `fut`, giving up after `secs` seconds when a limit is set.
///
/// Dropping the future on timeout kills any running renderer processes.
pub(crate) async fn with_deadline<F: Future>(
    secs: Option<u64>,
    fut: F,
) -> anyhow::Result<F::Output> {
    match secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| anyhow::anyhow!("Generation timed out after {secs}s")),
        None => Ok(fut.await),
    }
}

/// Expand `~` in a user-supplied path.
pub(crate) fn expand_path(path: &std::path::Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_passes_through() {
        let out = with_deadline(Some(5), async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        let out = with_deadline(None, async { "ok" }).await.unwrap();
        assert_eq!(out, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_times_out() {
        let err = with_deadline(Some(1), tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }

    #[test]
    fn test_format_maps_to_core() {
        assert_eq!(
            reelgen_core::OutputFormat::from(OutputFormat::Jsonl),
            reelgen_core::OutputFormat::JsonLines
        );
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(
            expand_path(std::path::Path::new("/tmp/videos")),
            PathBuf::from("/tmp/videos")
        );
    }
}
