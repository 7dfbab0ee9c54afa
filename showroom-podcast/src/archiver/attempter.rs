//! One capture attempt and its classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::retry::{AttemptSignal, Attempter};
use crate::capture::{CaptureBackend, CaptureError, StreamSpecFactory};
use crate::{Error, Result};

/// How one capture attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The stream ended and the capture finished normally.
    Completed,
    /// A transient condition; worth another attempt after a short delay.
    Retriable(CaptureError),
    /// Anything else, cancellation included.
    Fatal(CaptureError),
}

/// Classify the result of [`CaptureBackend::execute`].
pub fn classify(result: std::result::Result<(), CaptureError>) -> AttemptOutcome {
    match result {
        Ok(()) => AttemptOutcome::Completed,
        Err(e) if e.is_already_exists() || e.is_not_found() => AttemptOutcome::Retriable(e),
        Err(e) => AttemptOutcome::Fatal(e),
    }
}

/// Runs capture attempts for one room.
pub struct CaptureAttempter {
    room_id: u64,
    backend: Arc<dyn CaptureBackend>,
    factory: Arc<dyn StreamSpecFactory>,
    retry_delay: Duration,
    token: CancellationToken,
}

impl CaptureAttempter {
    pub fn new(
        room_id: u64,
        backend: Arc<dyn CaptureBackend>,
        factory: Arc<dyn StreamSpecFactory>,
        retry_delay: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            room_id,
            backend,
            factory,
            retry_delay,
            token,
        }
    }
}

#[async_trait]
impl Attempter for CaptureAttempter {
    type Error = Error;

    async fn attempt(&mut self, attempt: u32) -> Result<AttemptSignal> {
        debug!(room_id = self.room_id, attempt, backend = self.backend.name(), "Capture attempt");

        let result = self
            .backend
            .execute(self.factory.as_ref(), &self.token)
            .await;

        match classify(result) {
            AttemptOutcome::Completed => Ok(AttemptSignal::Finished),
            AttemptOutcome::Retriable(e) => {
                debug!(
                    room_id = self.room_id,
                    attempt,
                    error = %e,
                    delay = ?self.retry_delay,
                    "Retriable capture failure"
                );
                tokio::select! {
                    _ = self.token.cancelled() => {
                        debug!(room_id = self.room_id, pid = std::process::id(), "Cancelled during retry delay");
                        Err(Error::Cancelled)
                    }
                    _ = tokio::time::sleep(self.retry_delay) => Ok(AttemptSignal::Retry),
                }
            }
            AttemptOutcome::Fatal(CaptureError::Cancelled) => {
                debug!(room_id = self.room_id, pid = std::process::id(), "Capture cancelled");
                Err(Error::Cancelled)
            }
            AttemptOutcome::Fatal(e) => Err(Error::Capture(e)),
        }
    }
}
