//! Local renderer invocation as an external process.
//!
//! The renderer receives the request as command-line flags, writes the video
//! to disk and prints the output path as the last line of stdout.

use super::LocalBackend;
use crate::config::PrimaryConfig;
use crate::error::GenerationError;
use crate::pool::ExecutionContext;
use crate::types::GenerationRequest;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// stderr markers meaning the device itself is gone, not just this request.
const UNIT_FAULT_MARKERS: &[&str] = &[
    "out of memory",
    "no cuda-capable device",
    "cuda error",
    "device-side assert",
];

/// Maximum stderr characters carried into an error message.
const STDERR_EXCERPT: usize = 500;

/// Runs one generation per child process.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(program: &str, args: &[String], workdir: &Path, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    pub fn from_config(config: &PrimaryConfig, workdir: &Path) -> Self {
        Self::new(
            &config.program,
            &config.args,
            workdir,
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn command(&self, request: &GenerationRequest, context: &ExecutionContext) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--prompt")
            .arg(request.prompt())
            .arg("--aspect-ratio")
            .arg(&request.aspect_ratio)
            .arg("--resolution")
            .arg(&request.resolution);
        if let Some(negative) = &request.negative_prompt {
            cmd.arg("--negative-prompt").arg(negative);
        }
        if self.workdir.is_dir() {
            cmd.current_dir(&self.workdir);
        }
        context.apply(&mut cmd);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Resolve a printed path against the working directory.
    fn resolve_output(&self, printed: &str) -> PathBuf {
        let path = PathBuf::from(printed);
        if path.is_relative() && self.workdir.is_dir() {
            self.workdir.join(path)
        } else {
            path
        }
    }
}

#[async_trait]
impl LocalBackend for CommandBackend {
    fn name(&self) -> &str {
        "ovi"
    }

    async fn render(
        &self,
        request: &GenerationRequest,
        context: &ExecutionContext,
    ) -> Result<PathBuf, GenerationError> {
        let start = Instant::now();
        let child = self.command(request, context).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GenerationError::unavailable(
                    "primary",
                    format!("renderer program '{}' not found", self.program),
                )
            } else {
                GenerationError::GenerationFailed(format!("failed to launch renderer: {e}"))
            }
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                GenerationError::Timeout(format!(
                    "renderer exceeded {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| GenerationError::GenerationFailed(format!("renderer I/O error: {e}")))?;

        tracing::debug!(
            "Renderer finished in {:?} (unit {:?}, {})",
            start.elapsed(),
            context.unit(),
            output.status
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, output.status.code(), context));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .ok_or_else(|| {
                GenerationError::GenerationFailed("renderer printed no output path".to_string())
            })?;

        let path = self.resolve_output(printed);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(GenerationError::GenerationFailed(format!(
                "renderer output {} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }
}

/// Map a non-zero exit to either a per-item failure or a whole-unit fault.
fn classify_failure(
    stderr: &str,
    code: Option<i32>,
    context: &ExecutionContext,
) -> GenerationError {
    let excerpt = excerpt(stderr);
    let exit = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    let lower = stderr.to_lowercase();

    match context.unit() {
        Some(unit) if UNIT_FAULT_MARKERS.iter().any(|m| lower.contains(m)) => {
            GenerationError::UnitFault {
                unit,
                message: format!("renderer exited {exit}: {excerpt}"),
            }
        }
        _ => GenerationError::GenerationFailed(format!("renderer exited {exit}: {excerpt}")),
    }
}

/// Last `STDERR_EXCERPT` characters of stderr, where the traceback ends.
fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - STDERR_EXCERPT).collect();
    format!("...{tail}")
}
