//! Output records and JSON/JSONL writing.
//!
//! Records carry either a retrievable URL or the video inline as base64, plus
//! the provider that produced it or the error that stopped it.

use crate::error::GenerationError;
use crate::types::{Artifact, BatchResult, GeneratedVideo, GenerationResult, ProviderKind};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// One generated (or failed) video as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_url: Option<String>,
    pub video_base64: Option<String>,
    /// Where an inline video was written, when saved to disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    pub provider: Option<ProviderKind>,
    pub error: Option<String>,
}

impl VideoRecord {
    pub fn from_video(video: &GeneratedVideo) -> Self {
        let (video_url, video_base64) = match &video.artifact {
            Artifact::Url(url) => (Some(url.clone()), None),
            Artifact::Inline(bytes) => (None, Some(STANDARD.encode(bytes))),
        };
        Self {
            video_url,
            video_base64,
            video_path: None,
            provider: Some(video.provider),
            error: None,
        }
    }

    pub fn from_error(provider: Option<ProviderKind>, error: &GenerationError) -> Self {
        Self {
            video_url: None,
            video_base64: None,
            video_path: None,
            provider,
            error: Some(error.to_string()),
        }
    }

    pub fn from_result(result: &GenerationResult) -> Self {
        match result {
            GenerationResult::Success(video) => Self::from_video(video),
            GenerationResult::Failure { provider, reason } => {
                Self::from_error(Some(*provider), reason)
            }
        }
    }

    /// A video written to disk, reported by path instead of payload.
    pub fn saved(provider: ProviderKind, path: &Path) -> Self {
        Self {
            video_url: None,
            video_base64: None,
            video_path: Some(path.to_path_buf()),
            provider: Some(provider),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Batch output: one record per prompt plus fallback invocation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub videos: Vec<VideoRecord>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl From<&BatchResult> for BatchReport {
    fn from(batch: &BatchResult) -> Self {
        Self {
            videos: batch.results.iter().map(VideoRecord::from_result).collect(),
            errors: batch.errors.clone(),
        }
    }
}

/// A writer that serializes items to JSON or JSONL format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects JSON; JSONL is always one compact object per line.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a single item.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write a batch report.
    ///
    /// JSON writes the whole report as one object. JSONL writes one record
    /// per line; the error list goes to the log instead.
    pub fn write_report(&mut self, report: &BatchReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write(report),
            OutputFormat::JsonLines => {
                for record in &report.videos {
                    self.write(record)?;
                }
                for error in &report.errors {
                    tracing::warn!("{error}");
                }
                Ok(())
            }
        }
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
