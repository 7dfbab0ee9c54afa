//! Room scheduling: the per-room lock registry and the polling loop.

mod lock;
mod service;

pub use lock::{RoomLock, RoomLockGuard, RoomLockRegistry};
pub use service::{DEFAULT_INTER_ROOM_DELAY, Scheduler};
