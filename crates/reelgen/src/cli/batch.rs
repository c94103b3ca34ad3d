//! The `reelgen batch` command: one video per prompt, spread across local GPUs.

use clap::Args;
use reelgen_core::{
    Artifact, BatchReport, BatchRequest, BatchResult, Config, GenerationResult, Orchestrator,
    OutputWriter, VideoRecord,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{expand_path, spinner, with_deadline, OutputFormat};

/// Arguments for the `batch` command.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Prompts, one video each
    pub prompts: Vec<String>,

    /// Read prompts from a file, one per line (blank lines and # comments skipped)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Aspect ratio shared by all prompts (defaults to config)
    #[arg(long)]
    pub aspect_ratio: Option<String>,

    /// Resolution shared by all prompts (defaults to config)
    #[arg(long)]
    pub resolution: Option<String>,

    /// Negative prompt shared by all prompts
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write locally rendered videos to <DIR>/video_<n>.mp4 instead of inlining base64
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Give up on the whole batch after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Execute the batch command.
pub async fn execute(args: BatchArgs, config: &Config) -> anyhow::Result<()> {
    let prompts = collect_prompts(&args)?;
    if prompts.is_empty() {
        anyhow::bail!("No prompts given. Pass prompts as arguments or use --file.");
    }

    let batch = BatchRequest::from_prompts(
        prompts,
        args.aspect_ratio
            .as_deref()
            .unwrap_or(&config.defaults.aspect_ratio),
        args.resolution
            .as_deref()
            .unwrap_or(&config.defaults.resolution),
        args.negative_prompt.as_deref(),
    )?;
    let orchestrator = Orchestrator::from_config(config).await?;
    tracing::info!("Generating {} video(s) in batch", batch.len());

    let start_time = Instant::now();
    let progress = spinner(format!("Generating {} video(s)", batch.len()));
    let outcome = with_deadline(args.timeout, orchestrator.generate_batch(&batch)).await;
    progress.finish_and_clear();
    let result = outcome?;

    let report = build_report(&result, args.save_dir.as_deref().map(expand_path).as_deref())?;

    let format = args.format.into();
    match &args.output {
        Some(path) => {
            let path = expand_path(path);
            let file = File::create(&path)?;
            let mut writer = OutputWriter::new(BufWriter::new(file), format, true);
            writer.write_report(&report)?;
            writer.flush()?;
            tracing::info!("Output written to {:?}", path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = OutputWriter::new(stdout.lock(), format, true);
            writer.write_report(&report)?;
            writer.flush()?;
        }
    }

    print_summary(&result, start_time.elapsed());

    if result.succeeded() == 0 {
        anyhow::bail!("No videos were generated");
    }
    Ok(())
}

/// Prompts from the command line first, then from `--file`.
fn collect_prompts(args: &BatchArgs) -> anyhow::Result<Vec<String>> {
    let mut prompts = args.prompts.clone();
    if let Some(path) = &args.file {
        let path = expand_path(path);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read prompts from {:?}: {e}", path))?;
        prompts.extend(parse_prompt_lines(&content));
    }
    Ok(prompts)
}

fn parse_prompt_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
}

/// Turn batch results into output records, saving inline videos when asked.
fn build_report(result: &BatchResult, save_dir: Option<&Path>) -> anyhow::Result<BatchReport> {
    let Some(dir) = save_dir else {
        return Ok(BatchReport::from(result));
    };

    std::fs::create_dir_all(dir)?;
    let videos = result
        .results
        .iter()
        .enumerate()
        .map(|(i, item)| -> anyhow::Result<VideoRecord> {
            match item {
                GenerationResult::Success(video) => match &video.artifact {
                    Artifact::Inline(bytes) => {
                        let path = dir.join(format!("video_{}.mp4", i + 1));
                        std::fs::write(&path, bytes)?;
                        tracing::debug!("Saved video {} to {:?}", i + 1, path);
                        Ok(VideoRecord::saved(video.provider, &path))
                    }
                    Artifact::Url(_) => Ok(VideoRecord::from_result(item)),
                },
                failure => Ok(VideoRecord::from_result(failure)),
            }
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(BatchReport {
        videos,
        errors: result.errors.clone(),
    })
}

/// Print a formatted summary table after a batch.
fn print_summary(result: &BatchResult, elapsed: std::time::Duration) {
    let primary = result
        .results
        .iter()
        .filter(|r| r.is_success() && r.provider() == reelgen_core::ProviderKind::Primary)
        .count();
    let fallback = result.succeeded() - primary;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", result.succeeded());
    eprintln!("      primary:    {:>8}", primary);
    eprintln!("      fallback:   {:>8}", fallback);
    if result.failed() > 0 {
        eprintln!("    Failed:       {:>8}", result.failed());
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", result.results.len());
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
