//! Hand-off of archive tasks to the worker pool.

mod worker_pool;

pub use worker_pool::{WorkerPool, WorkerPoolConfig};

use std::sync::Arc;

use crate::Result;
use crate::archiver::Archiver;
use crate::scheduler::RoomLockGuard;

/// Starts an archive task for a room whose lock the caller holds.
pub trait ArchiveDispatcher: Send + Sync {
    /// Must return without waiting for the task to start.
    fn dispatch(&self, guard: RoomLockGuard) -> Result<()>;
}

/// Dispatches archive tasks onto a [`WorkerPool`].
pub struct PoolDispatcher {
    pool: Arc<WorkerPool>,
    archiver: Arc<Archiver>,
}

impl PoolDispatcher {
    pub fn new(pool: Arc<WorkerPool>, archiver: Arc<Archiver>) -> Self {
        Self { pool, archiver }
    }
}

impl ArchiveDispatcher for PoolDispatcher {
    fn dispatch(&self, guard: RoomLockGuard) -> Result<()> {
        let room_id = guard.room_id();
        let archiver = Arc::clone(&self.archiver);
        self.pool.submit(room_id, move |token| async move {
            archiver.archive(guard, token).await
        })
    }
}
