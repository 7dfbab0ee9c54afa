//! Room liveness monitoring.

mod poller;

pub use poller::{PollOutcome, PollRoom, RoomPoller};
