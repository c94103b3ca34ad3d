//! Core data types for video generation requests and results.

use crate::error::{GenerationError, GenerationOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default aspect ratio when a request does not specify one.
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Default resolution when a request does not specify one.
pub const DEFAULT_RESOLUTION: &str = "720p";

/// A single text-to-video request.
///
/// Aspect ratio and resolution are passed to the backends verbatim; values
/// other than the common ones ("16:9", "9:16", "720p") are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct GenerationRequest {
    prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl GenerationRequest {
    /// Build a request with default aspect ratio and resolution.
    ///
    /// Rejects an empty or whitespace-only prompt.
    pub fn new(prompt: impl Into<String>) -> GenerationOutcome<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        Ok(Self {
            prompt,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            negative_prompt: None,
        })
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    /// Set the negative prompt; an empty string clears it.
    pub fn with_negative_prompt(mut self, negative_prompt: Option<String>) -> Self {
        self.negative_prompt = negative_prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Prompt shortened for log lines.
    pub fn prompt_preview(&self) -> String {
        const MAX: usize = 50;
        if self.prompt.chars().count() <= MAX {
            self.prompt.clone()
        } else {
            let head: String = self.prompt.chars().take(MAX).collect();
            format!("{head}...")
        }
    }
}

/// Wire form of [`GenerationRequest`]; validated through [`GenerationRequest::new`].
#[derive(Deserialize)]
struct RawRequest {
    prompt: String,
    #[serde(default)]
    aspect_ratio: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    negative_prompt: Option<String>,
}

impl TryFrom<RawRequest> for GenerationRequest {
    type Error = GenerationError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let mut request = Self::new(raw.prompt)?.with_negative_prompt(raw.negative_prompt);
        if let Some(aspect_ratio) = raw.aspect_ratio {
            request = request.with_aspect_ratio(aspect_ratio);
        }
        if let Some(resolution) = raw.resolution {
            request = request.with_resolution(resolution);
        }
        Ok(request)
    }
}

/// Identity of the provider that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local multi-GPU renderer
    Primary,
    /// Remote long-running-operation service
    Fallback,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Primary => write!(f, "primary"),
            ProviderKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// A produced video: inline bytes from a local render, or a retrievable URL.
#[derive(Clone, PartialEq, Eq)]
pub enum Artifact {
    Inline(Vec<u8>),
    Url(String),
}

impl Artifact {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Artifact::Url(url) => Some(url),
            Artifact::Inline(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Artifact::Inline(bytes) => Some(bytes),
            Artifact::Url(_) => None,
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Video payloads are megabytes; never dump them into logs.
        match self {
            Artifact::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            Artifact::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// A successful generation, tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub artifact: Artifact,
    pub provider: ProviderKind,
}

/// Outcome of generating one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success(GeneratedVideo),
    Failure {
        provider: ProviderKind,
        reason: GenerationError,
    },
}

impl GenerationResult {
    pub fn success(provider: ProviderKind, artifact: Artifact) -> Self {
        Self::Success(GeneratedVideo { artifact, provider })
    }

    pub fn failure(provider: ProviderKind, reason: GenerationError) -> Self {
        Self::Failure { provider, reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Success(video) => video.provider,
            Self::Failure { provider, .. } => *provider,
        }
    }

    /// Failure reason, if this is a failure.
    pub fn reason(&self) -> Option<&GenerationError> {
        match self {
            Self::Success(_) => None,
            Self::Failure { reason, .. } => Some(reason),
        }
    }

    /// Convert into a `Result`, keeping the failure reason.
    pub fn into_outcome(self) -> GenerationOutcome<GeneratedVideo> {
        match self {
            Self::Success(video) => Ok(video),
            Self::Failure { reason, .. } => Err(reason),
        }
    }
}

/// An ordered batch of prompts sharing aspect ratio, resolution and negative prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub requests: Vec<GenerationRequest>,
}

impl BatchRequest {
    /// Build a batch from prompts with shared settings.
    ///
    /// Fails on the first empty prompt, naming its 1-based position.
    pub fn from_prompts<I, S>(
        prompts: I,
        aspect_ratio: &str,
        resolution: &str,
        negative_prompt: Option<&str>,
    ) -> GenerationOutcome<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests = prompts
            .into_iter()
            .enumerate()
            .map(|(i, prompt)| {
                GenerationRequest::new(prompt)
                    .map(|r| {
                        r.with_aspect_ratio(aspect_ratio)
                            .with_resolution(resolution)
                            .with_negative_prompt(negative_prompt.map(String::from))
                    })
                    .map_err(|e| GenerationError::InvalidRequest(format!("prompt {}: {e}", i + 1)))
            })
            .collect::<GenerationOutcome<Vec<_>>>()?;
        Ok(Self { requests })
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Results aligned position-for-position with a [`BatchRequest`].
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// One entry per input request, in input order
    pub results: Vec<GenerationResult>,
    /// Items that also failed on the fallback path, "Video N: reason"
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}
