//! Live room monitor and archiver for SHOWROOM.
//!
//! The [`scheduler::Scheduler`] polls every configured room in turn. When a
//! room is live and not already being recorded, the poller takes the room's
//! lock and hands an archive task to the [`dispatch::WorkerPool`]. The task
//! records the broadcast through a [`capture::CaptureBackend`], retrying
//! transient failures a bounded number of times, and releases the lock when
//! it ends.

pub mod app;
pub mod archiver;
pub mod capture;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod utils;

pub use app::{Dependencies, ShowroomPodcast, Timings};
pub use config::AppConfig;
pub use error::{Error, Result};
