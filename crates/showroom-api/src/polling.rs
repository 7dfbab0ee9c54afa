//! Live status polling.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::client::ShowroomClient;
use crate::error::ApiError;

const POLLING_ENDPOINT: &str = "polling";

/// Source of room liveness.
#[async_trait]
pub trait LivenessApi: Send + Sync {
    /// Returns whether `room_id` is currently live.
    ///
    /// Transient failures are reported as [`ApiError::TemporaryNetworkIssue`]
    /// so callers can tell "could not check" apart from "not live".
    async fn is_live(&self, room_id: u64) -> Result<bool, ApiError>;
}

/// Interpret a polling response body.
///
/// The endpoint reports a finished broadcast with `"live_end": 1`; any other
/// body, including one without the key, means the room is on air.
pub fn is_live_response(body: &Value) -> bool {
    body.get("live_end").and_then(Value::as_i64) != Some(1)
}

#[async_trait]
impl LivenessApi for ShowroomClient {
    async fn is_live(&self, room_id: u64) -> Result<bool, ApiError> {
        let body: Value = self
            .get_json(POLLING_ENDPOINT, room_id)
            .await
            .map_err(ApiError::classify_transient)?;

        let live = is_live_response(&body);
        debug!(room_id, live, "Polled room");
        Ok(live)
    }
}
