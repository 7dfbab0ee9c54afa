//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use showroom_api::{ApiError, LivenessApi, StreamingUrlApi};
use showroom_podcast::capture::{CaptureBackend, CaptureError, CaptureSpec, StreamSpecFactory};
use showroom_podcast::notification::{ErrorNotifier, ErrorReport, NotificationError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const STREAM_URL: &str = "https://hls.example/live_720.m3u8";

/// Always resolves to [`STREAM_URL`], or always fails.
pub struct FakeResolver {
    fail_with: Option<u16>,
}

impl FakeResolver {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail_with: None })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(status),
        })
    }
}

#[async_trait]
impl StreamingUrlApi for FakeResolver {
    async fn best_url(&self, _room_id: u64) -> Result<String, ApiError> {
        match self.fail_with {
            None => Ok(STREAM_URL.to_string()),
            Some(status) => Err(ApiError::Status {
                status,
                url: "http://fake/api/live/streaming_url".to_string(),
            }),
        }
    }
}

/// What the fake backend does on one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Complete,
    AlreadyExists,
    NotFound,
    Broken,
    /// Block until cancelled.
    WaitForCancel,
}

/// Capture backend replaying scripted steps, then repeating a default.
pub struct FakeBackend {
    steps: Mutex<VecDeque<Step>>,
    default: Step,
    calls: Mutex<Vec<Instant>>,
    specs: Mutex<Vec<CaptureSpec>>,
}

impl FakeBackend {
    pub fn new(steps: impl IntoIterator<Item = Step>, default: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            default,
            calls: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn specs(&self) -> Vec<CaptureSpec> {
        self.specs.lock().clone()
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn execute(
        &self,
        factory: &dyn StreamSpecFactory,
        token: &CancellationToken,
    ) -> Result<(), CaptureError> {
        self.calls.lock().push(Instant::now());
        let spec = factory.create().await?;
        self.specs.lock().push(spec.clone());

        let step = self.steps.lock().pop_front().unwrap_or(self.default);
        match step {
            Step::Complete => Ok(()),
            Step::AlreadyExists => Err(CaptureError::AlreadyExists {
                path: spec.output_path,
            }),
            Step::NotFound => Err(CaptureError::Process {
                exit_code: Some(1),
                stderr: format!("{}: Server returned 404 Not Found", spec.input_url),
            }),
            Step::Broken => Err(CaptureError::Process {
                exit_code: Some(1),
                stderr: format!("{}: Invalid data found when processing input", spec.input_url),
            }),
            Step::WaitForCancel => {
                token.cancelled().await;
                Err(CaptureError::Cancelled)
            }
        }
    }
}

/// Liveness behaviour of one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Room {
    Live,
    Offline,
    /// 503 from the polling endpoint.
    Flaky,
    /// 404 from the polling endpoint.
    Broken,
}

/// Liveness API answering from a fixed table and recording every poll.
pub struct FakeLiveness {
    rooms: HashMap<u64, Room>,
    polls: Mutex<Vec<u64>>,
}

impl FakeLiveness {
    pub fn new(rooms: impl IntoIterator<Item = (u64, Room)>) -> Arc<Self> {
        Arc::new(Self {
            rooms: rooms.into_iter().collect(),
            polls: Mutex::new(Vec::new()),
        })
    }

    pub fn polls(&self) -> Vec<u64> {
        self.polls.lock().clone()
    }
}

#[async_trait]
impl LivenessApi for FakeLiveness {
    async fn is_live(&self, room_id: u64) -> Result<bool, ApiError> {
        self.polls.lock().push(room_id);
        let status = |status| ApiError::Status {
            status,
            url: "http://fake/api/live/polling".to_string(),
        };
        match self.rooms.get(&room_id).copied().unwrap_or(Room::Offline) {
            Room::Live => Ok(true),
            Room::Offline => Ok(false),
            Room::Flaky => Err(status(503).classify_transient()),
            Room::Broken => Err(status(404).classify_transient()),
        }
    }
}

/// Records error reports; optionally fails every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<ErrorReport>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl ErrorNotifier for RecordingNotifier {
    async fn notify_error(&self, report: &ErrorReport) -> Result<(), NotificationError> {
        self.reports.lock().push(report.clone());
        if self.fail {
            return Err(NotificationError::Api("channel_not_found".to_string()));
        }
        Ok(())
    }
}
