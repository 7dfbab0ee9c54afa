//! Operator notifications for fatal errors.
//!
//! Only the top-level run wrapper notifies: when monitoring stops on an
//! unhandled error it posts the error type and message, then the details in a
//! reply thread.

mod slack;

pub use slack::{
    DEFAULT_SLACK_API_BASE, PostedMessage, SlackClient, SlackConfig, SlackNotification,
};

use std::backtrace::Backtrace;
use std::fmt::Write as _;

use async_trait::async_trait;
use thiserror::Error;

use crate::Error;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limited after {0} attempts")]
    RateLimited(u32),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Heading of the backtrace section in [`ErrorReport::details`].
pub const BACKTRACE_HEADER: &str = "Stack backtrace (at report time):";

/// Snapshot of a fatal error for the operator.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Error type name, see [`Error::kind`].
    pub kind: String,
    pub message: String,
    /// Messages of the source chain, outermost first.
    pub causes: Vec<String>,
    /// Stack of the reporting call site. Errors do not carry their own
    /// backtrace, so this shows where the failure was reported, not raised.
    pub backtrace: String,
}

impl ErrorReport {
    pub fn from_error(error: &Error) -> Self {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            causes,
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    /// `"{kind}: {message}"`
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }

    /// Cause chain followed by the backtrace.
    pub fn details(&self) -> String {
        let mut text = String::new();
        if !self.causes.is_empty() {
            text.push_str("Caused by:\n");
            for (i, cause) in self.causes.iter().enumerate() {
                let _ = writeln!(text, "  {i}: {cause}");
            }
            text.push('\n');
        }
        text.push_str(BACKTRACE_HEADER);
        text.push('\n');
        text.push_str(&self.backtrace);
        text
    }
}

/// Delivers fatal error reports.
#[async_trait]
pub trait ErrorNotifier: Send + Sync {
    async fn notify_error(&self, report: &ErrorReport) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use showroom_api::ApiError;

    #[test]
    fn test_report_from_error() {
        let error = Error::Api(ApiError::Status {
            status: 404,
            url: "https://www.showroom-live.com/api/live/polling".to_string(),
        });
        let report = ErrorReport::from_error(&error);

        assert_eq!(report.kind, "ApiError");
        assert_eq!(
            report.summary(),
            "ApiError: API error: unexpected status 404 from https://www.showroom-live.com/api/live/polling"
        );
        assert_eq!(report.causes.len(), 1);
        assert!(report.details().starts_with("Caused by:\n  0: unexpected status 404"));
        assert!(report.details().contains("Stack backtrace (at report time):\n"));
    }

    #[test]
    fn test_details_without_causes() {
        let report = ErrorReport::from_error(&Error::MaxRetriesExceeded { attempts: 5 });
        assert!(report.causes.is_empty());
        assert!(report.details().starts_with("Stack backtrace (at report time):\n"));
    }
}
