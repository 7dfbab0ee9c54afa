//! Archive task behaviour against a scripted capture backend.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use common::{FakeBackend, FakeResolver, STREAM_URL, Step};
use showroom_api::ApiError;
use showroom_podcast::archiver::{Archiver, ArchiverConfig};
use showroom_podcast::capture::{CaptureError, output_path};
use showroom_podcast::scheduler::RoomLockRegistry;
use showroom_podcast::utils::datetime::ARCHIVE_TIMEZONE;
use showroom_podcast::Error;
use tokio_util::sync::CancellationToken;

const ROOM: u64 = 61879;

fn archiver(backend: Arc<FakeBackend>, output_dir: &Path) -> Archiver {
    Archiver::new(
        backend,
        FakeResolver::ok(),
        ArchiverConfig {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        },
    )
}

fn fixed_now() -> DateTime<Tz> {
    ARCHIVE_TIMEZONE
        .with_ymd_and_hms(2021, 8, 1, 0, 4, 5)
        .single()
        .expect("valid timestamp")
}

mod outcome_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retriable_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([Step::AlreadyExists], Step::Complete);

        let guard = lock.try_lock().unwrap();
        let attempts = archiver(backend.clone(), dir.path())
            .archive(guard, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 2);
        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));

        assert!(!lock.is_held());
        assert_eq!(lock.acquisitions(), 1);
        assert_eq!(lock.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let backend = FakeBackend::new([Step::NotFound, Step::NotFound], Step::Complete);

        let guard = registry.get(ROOM).unwrap().try_lock().unwrap();
        let attempts = archiver(backend.clone(), dir.path())
            .archive(guard, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(registry.held_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_uses_a_fresh_spec() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let backend = FakeBackend::new([Step::NotFound], Step::Complete);

        let guard = registry.get(ROOM).unwrap().try_lock().unwrap();
        archiver(backend.clone(), dir.path())
            .archive(guard, CancellationToken::new())
            .await
            .unwrap();

        let specs = backend.specs();
        assert_eq!(specs.len(), 2);
        for spec in &specs {
            assert_eq!(spec.input_url, STREAM_URL);
            assert_eq!(spec.output_path.parent(), Some(dir.path()));
            let name = spec.output_path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with(&format!("{ROOM}-")), "{name}");
            assert!(name.ends_with(".mp4"), "{name}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([Step::Broken], Step::Complete);

        let guard = lock.try_lock().unwrap();
        let error = archiver(backend.clone(), dir.path())
            .archive(guard, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Capture(CaptureError::Process { exit_code: Some(1), .. })
        ));
        assert_eq!(backend.call_count(), 1);
        assert!(!lock.is_held());
        assert_eq!(lock.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_exhausted_after_five_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([], Step::NotFound);

        let guard = lock.try_lock().unwrap();
        let error = archiver(backend.clone(), dir.path())
            .archive(guard, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::MaxRetriesExceeded { attempts: 5 }));
        assert_eq!(error.kind(), "MaxRetriesExceeded");
        assert_eq!(backend.call_count(), 5);

        let calls = backend.calls();
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
        }
        assert!(!lock.is_held());
        assert_eq!(lock.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_output_file_exhausts_budget() {
        let dir = tempfile::tempdir().unwrap();
        // The clock is frozen, so every attempt collides with this file.
        std::fs::write(output_path(dir.path(), ROOM, &fixed_now()), b"").unwrap();

        let registry = RoomLockRegistry::create([ROOM]);
        let backend = FakeBackend::new([], Step::Complete);
        let archiver = archiver(backend.clone(), dir.path()).with_clock(fixed_now);

        let guard = registry.get(ROOM).unwrap().try_lock().unwrap();
        let error = archiver
            .archive(guard, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::MaxRetriesExceeded { attempts: 5 }));
        assert_eq!(backend.call_count(), 5);
        assert!(backend.specs().is_empty());
        assert_eq!(registry.held_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let backend = FakeBackend::new([], Step::Complete);
        let archiver = Archiver::new(
            backend.clone(),
            FakeResolver::failing(403),
            ArchiverConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );

        let guard = registry.get(ROOM).unwrap().try_lock().unwrap();
        let error = archiver
            .archive(guard, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Capture(CaptureError::Spec(ApiError::Status { status: 403, .. }))
        ));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(registry.held_count(), 0);
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_capture() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([], Step::WaitForCancel);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            canceller.cancel();
        });

        let guard = lock.try_lock().unwrap();
        let error = archiver(backend.clone(), dir.path())
            .archive(guard, token)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Cancelled));
        assert_eq!(backend.call_count(), 1);
        assert!(!lock.is_held());
        assert_eq!(lock.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_retry_delay() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([], Step::NotFound);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            canceller.cancel();
        });

        let guard = lock.try_lock().unwrap();
        let error = archiver(backend.clone(), dir.path())
            .archive(guard, token)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Cancelled));
        assert_eq!(backend.call_count(), 2);
        assert!(!lock.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_task_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RoomLockRegistry::create([ROOM]);
        let lock = registry.get(ROOM).unwrap();
        let backend = FakeBackend::new([], Step::WaitForCancel);

        let guard = lock.try_lock().unwrap();
        let archiver = archiver(backend.clone(), dir.path());
        let timed_out = tokio::time::timeout(
            Duration::from_secs(2),
            archiver.archive(guard, CancellationToken::new()),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(backend.call_count(), 1);
        assert!(!lock.is_held());
        assert_eq!(lock.releases(), 1);
        assert!(lock.try_acquire());
    }
}
