//! Application-wide error types.

use thiserror::Error;

use crate::archiver::RetriesExhausted;
use crate::capture::CaptureError;
use crate::notification::NotificationError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API error: {0}")]
    Api(#[from] showroom_api::ApiError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Archiving gave up after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    #[error("Archiving was cancelled")]
    Cancelled,

    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Lock for room {room_id} released while not held")]
    LockNotHeld { room_id: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("{0}")]
    Other(String),
}

impl From<RetriesExhausted> for Error {
    fn from(e: RetriesExhausted) -> Self {
        Self::MaxRetriesExceeded {
            attempts: e.attempts,
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Stable type name reported to the operator channel.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api(_) => "ApiError",
            Self::Capture(_) => "CaptureError",
            Self::MaxRetriesExceeded { .. } => "MaxRetriesExceeded",
            Self::Cancelled => "Cancelled",
            Self::Interrupted => "Interrupted",
            Self::LockNotHeld { .. } => "LockNotHeld",
            Self::Configuration(_) => "ConfigurationError",
            Self::Notification(_) => "NotificationError",
            Self::Io(_) => "IoError",
            Self::Yaml(_) => "YamlError",
            Self::WorkerPool(_) => "WorkerPoolError",
            Self::Other(_) => "Error",
        }
    }

    /// Whether this error is the operator stopping the process.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            Error::MaxRetriesExceeded { attempts: 5 }.kind(),
            "MaxRetriesExceeded"
        );
        assert_eq!(Error::config("bad").kind(), "ConfigurationError");
        assert_eq!(Error::Cancelled.kind(), "Cancelled");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::MaxRetriesExceeded { attempts: 5 }.to_string(),
            "Archiving gave up after 5 attempts"
        );
        assert_eq!(
            Error::LockNotHeld { room_id: 42 }.to_string(),
            "Lock for room 42 released while not held"
        );
    }

    #[test]
    fn test_only_interrupted_is_interrupt() {
        assert!(Error::Interrupted.is_interrupt());
        assert!(!Error::Cancelled.is_interrupt());
    }
}
