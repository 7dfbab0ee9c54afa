//! FFmpeg capture backend.

use std::process::Stdio;

use async_trait::async_trait;
use process_utils::{ProcessExit, read_tail, tokio_command, wait_or_terminate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CaptureBackend, CaptureError, CaptureSpec, StreamSpecFactory};
use crate::config::FfmpegConfig;

/// Written to ffmpeg's stdin to make it finalize the output and exit.
pub const QUIT_COMMAND: &[u8] = b"q";

/// ffmpeg's stderr wording when the stream URL is gone.
pub const NOT_FOUND_MARKER: &str = "404 Not Found";

/// ffmpeg's stderr wording when `-n` finds the output file present.
pub const ALREADY_EXISTS_MARKER: &str = "already exists. Exiting.";

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Captures a stream by remuxing it into MP4 with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    config: FfmpegConfig,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::with_config(FfmpegConfig::default())
    }

    pub fn with_config(config: FfmpegConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Build ffmpeg command arguments.
    fn build_args(spec: &CaptureSpec) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            // Never overwrite; an existing file is an error.
            "-n".to_string(),
            "-copytb".to_string(),
            "1".to_string(),
            "-i".to_string(),
            spec.input_url.clone(),
            "-f".to_string(),
            "mp4".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            spec.output_path.to_string_lossy().to_string(),
        ]
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn execute(
        &self,
        factory: &dyn StreamSpecFactory,
        token: &CancellationToken,
    ) -> Result<(), CaptureError> {
        let spec = tokio::select! {
            _ = token.cancelled() => {
                debug!("Cancelled while preparing the capture");
                return Err(CaptureError::Cancelled);
            }
            spec = factory.create() => spec?,
        };
        if token.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }
        let args = Self::build_args(&spec);

        info!(output = %spec.output_path.display(), "Starting ffmpeg capture");
        debug!(binary = %self.config.binary_path, ?args, "ffmpeg command");

        let mut child = tokio_command(&self.config.binary_path)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(CaptureError::Spawn)?;

        let pid = child.id();
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            match stderr {
                Some(stderr) => read_tail(stderr, STDERR_TAIL_LINES).await,
                None => String::new(),
            }
        });

        let exit = wait_or_terminate(
            child,
            token,
            Some(QUIT_COMMAND),
            self.config.time_to_force_termination(),
        )
        .await?;

        match exit {
            ProcessExit::Terminated { forced } => {
                stderr_task.abort();
                debug!(?pid, forced, "ffmpeg capture cancelled");
                Err(CaptureError::Cancelled)
            }
            ProcessExit::Exited(status) if status.success() => {
                stderr_task.abort();
                info!(output = %spec.output_path.display(), "ffmpeg capture finished");
                Ok(())
            }
            ProcessExit::Exited(status) => {
                let stderr = stderr_task.await.unwrap_or_default();
                warn!(?pid, %status, "ffmpeg exited with an error");
                Err(CaptureError::Process {
                    exit_code: status.code(),
                    stderr,
                })
            }
        }
    }
}
