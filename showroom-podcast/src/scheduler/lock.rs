//! Per-room archive locks.
//!
//! Every monitored room owns exactly one [`RoomLock`], created when the
//! registry is built and kept for the lifetime of the process. The poller
//! acquires a room's lock before dispatching an archive task and the task
//! releases it when it ends, whichever way it ends. Archive tasks run on the
//! shared tokio runtime, so an `Arc`-shared atomic flag is visible to every
//! worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{error, trace, warn};

use crate::{Error, Result};

/// Mutual-exclusion flag for one room.
#[derive(Debug)]
pub struct RoomLock {
    room_id: u64,
    held: AtomicBool,
    acquisitions: AtomicU64,
    releases: AtomicU64,
}

impl RoomLock {
    fn new(room_id: u64) -> Self {
        Self {
            room_id,
            held: AtomicBool::new(false),
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    pub fn room_id(&self) -> u64 {
        self.room_id
    }

    /// Non-blocking acquire. Returns `true` iff the lock moved from free to held.
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if acquired {
            self.acquisitions.fetch_add(1, Ordering::Relaxed);
            trace!(room_id = self.room_id, "Room lock acquired");
        }
        acquired
    }

    /// Move the lock from held to free.
    ///
    /// Releasing a free lock is a caller bug and is reported as
    /// [`Error::LockNotHeld`] instead of being ignored.
    pub fn release(&self) -> Result<()> {
        self.held
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::LockNotHeld {
                room_id: self.room_id,
            })?;
        self.releases.fetch_add(1, Ordering::Relaxed);
        trace!(room_id = self.room_id, "Room lock released");
        Ok(())
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Total successful acquisitions since creation.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Total successful releases since creation.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Acquire the lock and wrap it in a guard that releases on drop.
    pub fn try_lock(self: &Arc<Self>) -> Option<RoomLockGuard> {
        self.try_acquire().then(|| RoomLockGuard {
            lock: Arc::clone(self),
            released: false,
        })
    }
}

/// Holds a [`RoomLock`] until released or dropped.
///
/// Dropping the guard covers every exit path of an archive task, including
/// the task future being dropped by cancellation before it ever ran.
#[derive(Debug)]
#[must_use = "dropping the guard releases the room lock immediately"]
pub struct RoomLockGuard {
    lock: Arc<RoomLock>,
    released: bool,
}

impl RoomLockGuard {
    pub fn room_id(&self) -> u64 {
        self.lock.room_id
    }

    /// Release explicitly, surfacing a double release as an error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for RoomLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.lock.release() {
            error!(room_id = self.lock.room_id, error = %e, "Failed to release room lock");
        }
    }
}

/// One lock per configured room, fixed at startup.
#[derive(Debug, Default)]
pub struct RoomLockRegistry {
    order: Vec<u64>,
    locks: HashMap<u64, Arc<RoomLock>>,
}

impl RoomLockRegistry {
    /// Create a free lock for every room id.
    ///
    /// Iteration order follows `room_ids`; repeated ids keep their first
    /// position.
    pub fn create(room_ids: impl IntoIterator<Item = u64>) -> Self {
        let mut registry = Self::default();
        for room_id in room_ids {
            if registry.locks.contains_key(&room_id) {
                warn!(room_id, "Duplicate room id ignored");
                continue;
            }
            registry.order.push(room_id);
            registry
                .locks
                .insert(room_id, Arc::new(RoomLock::new(room_id)));
        }
        registry
    }

    pub fn get(&self, room_id: u64) -> Option<&Arc<RoomLock>> {
        self.locks.get(&room_id)
    }

    /// Monitored rooms in polling order.
    pub fn room_ids(&self) -> &[u64] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of rooms whose lock is currently held.
    pub fn held_count(&self) -> usize {
        self.locks.values().filter(|lock| lock.is_held()).count()
    }
}
