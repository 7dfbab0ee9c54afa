//! Per-attempt capture specs for SHOWROOM rooms.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use showroom_api::StreamingUrlApi;
use tracing::debug;

use super::{CaptureError, CaptureSpec, StreamSpecFactory};
use crate::utils::datetime::{self, Clock};

/// `{output_dir}/{room_id}-{YYYY_MM_DD-HH_MM_SS}.mp4`
pub fn output_path(output_dir: &Path, room_id: u64, at: &DateTime<Tz>) -> PathBuf {
    output_dir.join(format!("{}-{}.mp4", room_id, datetime::file_timestamp(at)))
}

/// Resolves the best stream of a room and stamps a fresh output path.
pub struct ShowroomStreamSpecFactory {
    room_id: u64,
    output_dir: PathBuf,
    resolver: Arc<dyn StreamingUrlApi>,
    clock: Clock,
}

impl ShowroomStreamSpecFactory {
    pub fn new(room_id: u64, output_dir: PathBuf, resolver: Arc<dyn StreamingUrlApi>) -> Self {
        Self {
            room_id,
            output_dir,
            resolver,
            clock: datetime::now_jst,
        }
    }

    /// Override the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl StreamSpecFactory for ShowroomStreamSpecFactory {
    async fn create(&self) -> Result<CaptureSpec, CaptureError> {
        let input_url = self.resolver.best_url(self.room_id).await?;

        let path = output_path(&self.output_dir, self.room_id, &(self.clock)());
        if tokio::fs::try_exists(&path).await? {
            return Err(CaptureError::AlreadyExists { path });
        }

        debug!(room_id = self.room_id, path = %path.display(), "Prepared capture spec");
        Ok(CaptureSpec {
            input_url,
            output_path: path,
        })
    }
}
