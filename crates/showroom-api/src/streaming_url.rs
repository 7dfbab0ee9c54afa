//! Streaming URL lookup and best-quality selection.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::client::ShowroomClient;
use crate::error::ApiError;

const STREAMING_URL_ENDPOINT: &str = "streaming_url";

/// Schemes the capture backend cannot read.
const UNSUPPORTED_SCHEMES: &[&str] = &["webrtc://"];

/// One entry of `streaming_url_list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamingUrl {
    pub url: String,
    /// Newer responses sometimes omit the quality; such entries rank lowest.
    #[serde(default)]
    pub quality: i64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl StreamingUrl {
    /// Whether the capture backend can read this URL.
    pub fn is_supported(&self) -> bool {
        !UNSUPPORTED_SCHEMES
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

#[derive(Debug, Deserialize)]
struct StreamingUrlResponse {
    #[serde(default)]
    streaming_url_list: Vec<StreamingUrl>,
}

/// Pick the highest-quality supported entry.
///
/// Ties go to the entry listed first.
pub fn select_best(urls: &[StreamingUrl]) -> Option<&StreamingUrl> {
    urls.iter()
        .filter(|u| u.is_supported())
        .fold(None, |best: Option<&StreamingUrl>, candidate| match best {
            Some(current) if current.quality >= candidate.quality => Some(current),
            _ => Some(candidate),
        })
}

/// Source of stream URLs for a live room.
#[async_trait]
pub trait StreamingUrlApi: Send + Sync {
    /// Resolve the URL of the best-quality stream for `room_id`.
    async fn best_url(&self, room_id: u64) -> Result<String, ApiError>;
}

#[async_trait]
impl StreamingUrlApi for ShowroomClient {
    async fn best_url(&self, room_id: u64) -> Result<String, ApiError> {
        let response: StreamingUrlResponse =
            self.get_json(STREAMING_URL_ENDPOINT, room_id).await?;

        let best = select_best(&response.streaming_url_list)
            .ok_or(ApiError::NoStreams { room_id })?;

        debug!(
            room_id,
            quality = best.quality,
            url = %best.url,
            candidates = response.streaming_url_list.len(),
            "Resolved streaming url"
        );
        Ok(best.url.clone())
    }
}
