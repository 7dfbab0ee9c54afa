use thiserror::Error;

/// HTTP statuses the SHOWROOM API returns transiently under load.
///
/// The service has been seen answering 502/503/504 for a few seconds at a
/// time and, more rarely, 500. All four are treated as "try again next cycle".
pub const TEMPORARY_STATUS_CODES: &[u16] = &[500, 502, 503, 504];

/// Resolver failures that are transient rather than a misconfiguration.
pub const TEMPORARY_DNS_MESSAGES: &[&str] = &[
    "Name or service not known",
    "Temporary failure in name resolution",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("temporary network issue: {source}")]
    TemporaryNetworkIssue {
        #[source]
        source: Box<ApiError>,
    },
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("no usable streams for room {room_id}")]
    NoStreams { room_id: u64 },
}

impl ApiError {
    /// Whether this error was classified as a transient network issue.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::TemporaryNetworkIssue { .. })
    }

    /// Wrap `self` as a temporary network issue if it matches one of the
    /// transient status codes or DNS failures, otherwise return it unchanged.
    pub fn classify_transient(self) -> Self {
        let transient = match &self {
            Self::Status { status, .. } => TEMPORARY_STATUS_CODES.contains(status),
            Self::Http(e) => is_dns_failure(&error_chain_text(e)),
            _ => false,
        };

        if transient {
            Self::TemporaryNetworkIssue {
                source: Box::new(self),
            }
        } else {
            self
        }
    }
}

/// Whether `message` contains one of [`TEMPORARY_DNS_MESSAGES`].
pub fn is_dns_failure(message: &str) -> bool {
    TEMPORARY_DNS_MESSAGES
        .iter()
        .any(|needle| message.contains(needle))
}

/// Render an error together with all of its sources.
///
/// reqwest only exposes the resolver message through the source chain, so
/// the top-level `Display` alone is not enough for classification.
pub(crate) fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
