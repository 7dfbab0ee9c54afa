//! Archiving of live rooms.
//!
//! An archive task runs capture attempts for one room under a
//! [`RetrySequencer`] until the broadcast ends, a fatal error occurs, or the
//! attempt budget runs out.

mod attempter;
mod retry;
mod service;

pub use attempter::{AttemptOutcome, CaptureAttempter, classify};
pub use retry::{AttemptSignal, Attempter, DEFAULT_MAX_ATTEMPTS, RetriesExhausted, RetrySequencer};
pub use service::{Archiver, ArchiverConfig};
