//! The polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::monitor::PollRoom;

/// Default pause after each room.
pub const DEFAULT_INTER_ROOM_DELAY: Duration = Duration::from_secs(1);

/// Polls every room in a fixed order, one at a time, forever.
pub struct Scheduler {
    rooms: Vec<u64>,
    poller: Arc<dyn PollRoom>,
    inter_room_delay: Duration,
}

impl Scheduler {
    pub fn new(rooms: Vec<u64>, poller: Arc<dyn PollRoom>) -> Self {
        Self {
            rooms,
            poller,
            inter_room_delay: DEFAULT_INTER_ROOM_DELAY,
        }
    }

    pub fn with_inter_room_delay(mut self, delay: Duration) -> Self {
        self.inter_room_delay = delay;
        self
    }

    pub fn rooms(&self) -> &[u64] {
        &self.rooms
    }

    /// Poll rooms until `token` is cancelled or a poll fails.
    ///
    /// Only returns `Ok` after cancellation.
    pub async fn run(&self, token: &CancellationToken) -> Result<()> {
        info!(rooms = ?self.rooms, "Starting room polling loop");
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            if !self.run_cycle(token).await? {
                info!(cycle, "Room polling loop stopped");
                return Ok(());
            }
        }
    }

    /// Poll each room once, pausing after each.
    ///
    /// Returns `false` if `token` was cancelled before the cycle completed.
    pub async fn run_cycle(&self, token: &CancellationToken) -> Result<bool> {
        for &room_id in &self.rooms {
            let outcome = tokio::select! {
                _ = token.cancelled() => return Ok(false),
                outcome = self.poller.poll(room_id) => outcome?,
            };
            debug!(room_id, ?outcome, "Polled room");

            tokio::select! {
                _ = token.cancelled() => return Ok(false),
                _ = tokio::time::sleep(self.inter_room_delay) => {}
            }
        }
        Ok(true)
    }
}
