//! The `reelgen generate` command for a single video.

use clap::Args;
use reelgen_core::{Artifact, Config, GeneratedVideo, GenerationRequest, Orchestrator, VideoRecord};
use std::path::PathBuf;

use super::{expand_path, spinner, with_deadline};

/// Arguments for the `generate` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text prompt describing the video
    #[arg(required = true)]
    pub prompt: String,

    /// Aspect ratio, e.g. "16:9" or "9:16" (defaults to config)
    #[arg(long)]
    pub aspect_ratio: Option<String>,

    /// Resolution, e.g. "720p" (defaults to config)
    #[arg(long)]
    pub resolution: Option<String>,

    /// Things the video should avoid
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Write a locally rendered video to this file instead of printing base64
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl GenerateArgs {
    pub(crate) fn to_request(&self, config: &Config) -> anyhow::Result<GenerationRequest> {
        let request = GenerationRequest::new(self.prompt.clone())?
            .with_aspect_ratio(
                self.aspect_ratio
                    .clone()
                    .unwrap_or_else(|| config.defaults.aspect_ratio.clone()),
            )
            .with_resolution(
                self.resolution
                    .clone()
                    .unwrap_or_else(|| config.defaults.resolution.clone()),
            )
            .with_negative_prompt(self.negative_prompt.clone());
        Ok(request)
    }
}

/// Execute the generate command.
pub async fn execute(args: GenerateArgs, config: &Config) -> anyhow::Result<()> {
    let request = args.to_request(config)?;
    let orchestrator = Orchestrator::from_config(config).await?;

    let progress = spinner(format!("Generating '{}'", request.prompt_preview()));
    let outcome = with_deadline(args.timeout, orchestrator.generate(&request)).await;
    progress.finish_and_clear();

    let video = match outcome? {
        Ok(video) => video,
        Err(e) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&VideoRecord::from_error(None, &e))?
            );
            anyhow::bail!("Video generation failed: {e}");
        }
    };

    let record = match &args.output {
        Some(path) => save_video(&video, &expand_path(path))?,
        None => VideoRecord::from_video(&video),
    };
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Write an inline video to `path`. Remote videos are reported by URL.
fn save_video(video: &GeneratedVideo, path: &std::path::Path) -> anyhow::Result<VideoRecord> {
    match &video.artifact {
        Artifact::Inline(bytes) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, bytes)?;
            tracing::info!("Video written to {:?}", path);
            Ok(VideoRecord::saved(video.provider, path))
        }
        Artifact::Url(url) => {
            tracing::warn!("Video was generated remotely; download it from {url}");
            Ok(VideoRecord::from_video(video))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_core::ProviderKind;

    fn args(prompt: &str) -> GenerateArgs {
        GenerateArgs {
            prompt: prompt.to_string(),
            aspect_ratio: None,
            resolution: None,
            negative_prompt: None,
            output: None,
            timeout: None,
        }
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let mut config = Config::default();
        config.defaults.resolution = "1080p".to_string();

        let request = args("a fox").to_request(&config).unwrap();
        assert_eq!(request.aspect_ratio, "16:9");
        assert_eq!(request.resolution, "1080p");
    }

    #[test]
    fn test_request_flags_override_config() {
        let mut a = args("a fox");
        a.aspect_ratio = Some("9:16".to_string());
        a.negative_prompt = Some("watermark".to_string());

        let request = a.to_request(&Config::default()).unwrap();
        assert_eq!(request.aspect_ratio, "9:16");
        assert_eq!(request.negative_prompt.as_deref(), Some("watermark"));
    }

    #[test]
    fn test_blank_prompt_rejected() {
        assert!(args("  ").to_request(&Config::default()).is_err());
    }

    #[test]
    fn test_save_inline_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.mp4");
        let video = GeneratedVideo {
            artifact: Artifact::Inline(b"mp4-bytes".to_vec()),
            provider: ProviderKind::Primary,
        };

        let record = save_video(&video, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"mp4-bytes");
        assert_eq!(record.video_path, Some(path));
        assert!(record.video_base64.is_none());
    }

    #[test]
    fn test_save_remote_video_keeps_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        let video = GeneratedVideo {
            artifact: Artifact::Url("https://v/1.mp4".into()),
            provider: ProviderKind::Fallback,
        };

        let record = save_video(&video, &path).unwrap();
        assert_eq!(record.video_url.as_deref(), Some("https://v/1.mp4"));
        assert!(!path.exists());
    }
}
