//! Capture backends.
//!
//! A capture backend records one live stream into one output file. The
//! stream URL and output path are produced lazily by a [`StreamSpecFactory`]
//! so that every attempt gets a fresh URL and a fresh timestamped path.

mod ffmpeg;
mod spec;

pub use ffmpeg::{ALREADY_EXISTS_MARKER, FfmpegBackend, NOT_FOUND_MARKER, QUIT_COMMAND};
pub use spec::{ShowroomStreamSpecFactory, output_path};

use std::path::PathBuf;

use async_trait::async_trait;
use showroom_api::ApiError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors raised while capturing a stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Output file already exists: {}", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Failed to resolve stream: {0}")]
    Spec(#[from] ApiError),

    #[error("Capture process failed (exit code {exit_code:?}): {stderr}")]
    Process {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to start capture process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture cancelled")]
    Cancelled,
}

impl CaptureError {
    /// The backend could not find the stream, usually because the broadcast
    /// ended between the liveness check and the capture start.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Process { stderr, .. } if stderr.contains(NOT_FOUND_MARKER))
    }

    /// The output file was already there, either before the backend started
    /// or because it appeared before the backend opened it.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::Process { stderr, .. } => stderr.contains(ALREADY_EXISTS_MARKER),
            _ => false,
        }
    }
}

/// Input and output of one capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    pub input_url: String,
    pub output_path: PathBuf,
}

/// Produces the [`CaptureSpec`] for one attempt.
#[async_trait]
pub trait StreamSpecFactory: Send + Sync {
    async fn create(&self) -> Result<CaptureSpec, CaptureError>;
}

/// Records a stream until it ends or the token is cancelled.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Run one capture.
    ///
    /// `factory` is invoked once, at the start of the call. Cancellation must
    /// surface as [`CaptureError::Cancelled`].
    async fn execute(
        &self,
        factory: &dyn StreamSpecFactory,
        token: &CancellationToken,
    ) -> Result<(), CaptureError>;
}
