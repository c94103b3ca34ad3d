//! Veo video generation over the Generative Language REST API.
//!
//! Jobs are started with `predictLongRunning` and tracked through the
//! returned operation name. The API key travels in a header; only the
//! returned video URI carries it, so the file can be downloaded.

use super::{OperationHandle, PollStatus, RemoteService};
use crate::config::FallbackConfig;
use crate::error::GenerationError;
use crate::types::GenerationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Veo client using the long-running operations API.
pub struct VeoClient {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    submit_timeout: Duration,
    poll_timeout: Duration,
}

impl VeoClient {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            submit_timeout: Duration::from_secs(300),
            poll_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &FallbackConfig, api_key: &str) -> Self {
        Self {
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            ..Self::new(&config.endpoint, &config.model, api_key)
        }
    }

    fn submit_url(&self) -> String {
        format!("{}/models/{}:predictLongRunning", self.endpoint, self.model)
    }

    fn poll_url(&self, handle: &OperationHandle) -> String {
        format!("{}/{}", self.endpoint, handle.0)
    }

    /// Make a returned video URI downloadable by attaching the API key.
    fn authorize_uri(&self, uri: &str) -> String {
        let sep = if uri.contains('?') { '&' } else { '?' };
        format!("{uri}{sep}key={}", self.api_key)
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    prompt: &'a str,
    config: VideoConfig<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoConfig<'a> {
    number_of_videos: u32,
    resolution: &'a str,
    aspect_ratio: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct SubmitResponse {
    name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Operation {
    done: bool,
    response: Option<OperationResponse>,
    error: Option<OperationError>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct OperationResponse {
    generated_videos: Vec<GeneratedVideo>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeneratedVideo {
    video: Option<VideoRef>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct VideoRef {
    uri: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OperationError {
    code: Option<i32>,
    message: String,
}

impl Operation {
    fn into_status(self) -> PollStatus {
        if !self.done {
            return PollStatus::Pending;
        }
        if let Some(err) = self.error {
            let message = match err.code {
                Some(code) => format!("operation failed with code {code}: {}", err.message),
                None => format!("operation failed: {}", err.message),
            };
            return PollStatus::Rejected { message };
        }
        let artifact_url = self
            .response
            .and_then(|r| r.generated_videos.into_iter().next())
            .and_then(|v| v.video)
            .and_then(|v| v.uri)
            .filter(|u| !u.is_empty());
        PollStatus::Complete { artifact_url }
    }
}

#[async_trait]
impl RemoteService for VeoClient {
    fn name(&self) -> &str {
        "veo"
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<OperationHandle, GenerationError> {
        let body = SubmitRequest {
            prompt: request.prompt(),
            config: VideoConfig {
                number_of_videos: 1,
                resolution: &request.resolution,
                aspect_ratio: &request.aspect_ratio,
            },
            negative_prompt: request.negative_prompt.as_deref(),
        };

        let resp = self
            .client
            .post(self.submit_url())
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(|e| {
                GenerationError::GenerationFailed(format!("Veo submit failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::UpstreamRejected {
                status: Some(status.as_u16()),
                message: text,
            });
        }

        let submitted: SubmitResponse = resp.json().await.map_err(|e| {
            GenerationError::GenerationFailed(format!(
                "Failed to parse Veo submit response: {}",
                e.without_url()
            ))
        })?;

        submitted
            .name
            .filter(|n| !n.is_empty())
            .map(OperationHandle)
            .ok_or_else(|| GenerationError::UpstreamRejected {
                status: Some(status.as_u16()),
                message: "no operation name in response".to_string(),
            })
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<PollStatus, GenerationError> {
        let resp = self
            .client
            .get(self.poll_url(handle))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(|e| {
                GenerationError::TransientPollFailure(format!("Veo poll failed: {}", e.without_url()))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GenerationError::TransientPollFailure(format!(
                "Veo poll HTTP {status}: {text}"
            )));
        }

        let operation: Operation = resp.json().await.map_err(|e| {
            GenerationError::TransientPollFailure(format!(
                "Failed to parse Veo operation: {}",
                e.without_url()
            ))
        })?;

        Ok(match operation.into_status() {
            PollStatus::Complete { artifact_url } => PollStatus::Complete {
                artifact_url: artifact_url.map(|u| self.authorize_uri(&u)),
            },
            other => other,
        })
    }
}
