//! Archive task for one live room.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use showroom_api::StreamingUrlApi;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::attempter::CaptureAttempter;
use super::retry::{DEFAULT_MAX_ATTEMPTS, RetrySequencer};
use crate::capture::{CaptureBackend, ShowroomStreamSpecFactory};
use crate::scheduler::RoomLockGuard;
use crate::utils::datetime::{self, Clock};
use crate::{Error, Result};

/// Archiver settings.
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Directory archive files are written to.
    pub output_dir: PathBuf,
    /// Attempt budget for one archive task.
    pub max_attempts: u32,
    /// Pause after a retriable attempt.
    pub retry_delay: Duration,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Records live rooms through a [`CaptureBackend`].
pub struct Archiver {
    backend: Arc<dyn CaptureBackend>,
    resolver: Arc<dyn StreamingUrlApi>,
    config: ArchiverConfig,
    clock: Clock,
}

impl Archiver {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        resolver: Arc<dyn StreamingUrlApi>,
        config: ArchiverConfig,
    ) -> Self {
        Self {
            backend,
            resolver,
            config,
            clock: datetime::now_jst,
        }
    }

    /// Override the time source used for output file names.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Archive the room held by `guard` until the broadcast ends.
    ///
    /// The room lock is released exactly once when this returns, whatever the
    /// outcome, and also if the returned future is dropped early. Returns the
    /// number of capture attempts made.
    #[instrument(skip_all, fields(room_id = guard.room_id()))]
    pub async fn archive(&self, guard: RoomLockGuard, token: CancellationToken) -> Result<u32> {
        let room_id = guard.room_id();
        let factory = ShowroomStreamSpecFactory::new(
            room_id,
            self.config.output_dir.clone(),
            Arc::clone(&self.resolver),
        )
        .with_clock(self.clock);

        let attempter = CaptureAttempter::new(
            room_id,
            Arc::clone(&self.backend),
            Arc::new(factory),
            self.config.retry_delay,
            token,
        );

        let result = RetrySequencer::new(attempter, self.config.max_attempts)
            .run()
            .await;

        match &result {
            Ok(attempts) => info!(room_id, attempts, "Archiving finished"),
            Err(Error::Cancelled) => debug!(room_id, "Archiving cancelled"),
            Err(e) => warn!(room_id, error = %e, "Archiving stopped"),
        }

        let released = guard.release();
        let attempts = result?;
        released?;
        Ok(attempts)
    }
}
