//! Clients for the SHOWROOM live API.
//!
//! Two endpoints are covered: `polling`, which reports whether a room is on
//! air, and `streaming_url`, which lists the playable streams of a live room.
//! Both are exposed through small traits so the recorder can be driven by
//! fakes in tests.

pub mod client;
pub mod error;
pub mod polling;
pub mod streaming_url;

pub use client::{ClientConfig, ShowroomClient};
pub use error::ApiError;
pub use polling::LivenessApi;
pub use streaming_url::{StreamingUrl, StreamingUrlApi};
