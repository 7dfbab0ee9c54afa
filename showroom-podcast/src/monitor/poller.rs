//! Liveness polling for a single room.

use std::sync::Arc;

use async_trait::async_trait;
use showroom_api::LivenessApi;
use tracing::{debug, info};

use crate::dispatch::ArchiveDispatcher;
use crate::scheduler::RoomLockRegistry;
use crate::{Error, Result};

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The liveness check failed transiently; treated as not live this cycle.
    Unavailable,
    NotLive,
    /// Live, but an archive task already holds the room lock.
    AlreadyArchiving,
    /// Live; the lock was taken and an archive task dispatched.
    Dispatched,
}

/// Polls one room per call.
#[async_trait]
pub trait PollRoom: Send + Sync {
    async fn poll(&self, room_id: u64) -> Result<PollOutcome>;
}

/// Checks liveness and dispatches archive tasks for live rooms.
pub struct RoomPoller {
    liveness: Arc<dyn LivenessApi>,
    registry: Arc<RoomLockRegistry>,
    dispatcher: Arc<dyn ArchiveDispatcher>,
}

impl RoomPoller {
    pub fn new(
        liveness: Arc<dyn LivenessApi>,
        registry: Arc<RoomLockRegistry>,
        dispatcher: Arc<dyn ArchiveDispatcher>,
    ) -> Self {
        Self {
            liveness,
            registry,
            dispatcher,
        }
    }
}

#[async_trait]
impl PollRoom for RoomPoller {
    async fn poll(&self, room_id: u64) -> Result<PollOutcome> {
        let lock = self
            .registry
            .get(room_id)
            .ok_or_else(|| Error::Other(format!("room {room_id} is not monitored")))?;

        let live = match self.liveness.is_live(room_id).await {
            Ok(live) => live,
            Err(e) if e.is_temporary() => {
                debug!(room_id, error = %e, "Temporary network issue, skipping room this cycle");
                return Ok(PollOutcome::Unavailable);
            }
            Err(e) => return Err(e.into()),
        };

        if !live {
            return Ok(PollOutcome::NotLive);
        }

        let Some(guard) = lock.try_lock() else {
            debug!(room_id, "Room is live and already being archived");
            return Ok(PollOutcome::AlreadyArchiving);
        };

        info!(room_id, "Room is live, dispatching archive task");
        self.dispatcher.dispatch(guard)?;
        Ok(PollOutcome::Dispatched)
    }
}
