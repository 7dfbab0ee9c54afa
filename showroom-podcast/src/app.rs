//! Component wiring and the top-level run wrapper.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use showroom_api::{LivenessApi, ShowroomClient, StreamingUrlApi};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::archiver::{Archiver, ArchiverConfig};
use crate::capture::{CaptureBackend, FfmpegBackend};
use crate::config::AppConfig;
use crate::dispatch::{PoolDispatcher, WorkerPool};
use crate::monitor::RoomPoller;
use crate::notification::{ErrorNotifier, ErrorReport, SlackNotification};
use crate::scheduler::{DEFAULT_INTER_ROOM_DELAY, RoomLockRegistry, Scheduler};
use crate::{Error, Result};

/// External collaborators of the core.
#[derive(Clone)]
pub struct Dependencies {
    pub liveness: Arc<dyn LivenessApi>,
    pub resolver: Arc<dyn StreamingUrlApi>,
    pub backend: Arc<dyn CaptureBackend>,
    pub notifier: Option<Arc<dyn ErrorNotifier>>,
}

impl Dependencies {
    /// Production collaborators built from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(ShowroomClient::with_config(config.api.client_config())?);
        let backend = Arc::new(FfmpegBackend::with_config(config.ffmpeg.clone()));

        let notifier = match config.slack() {
            Some(slack) => SlackNotification::from_config(slack)?
                .map(|n| Arc::new(n) as Arc<dyn ErrorNotifier>),
            None => None,
        };

        Ok(Self {
            liveness: client.clone(),
            resolver: client,
            backend,
            notifier,
        })
    }
}

/// Loop timings; the defaults are the production values.
#[derive(Debug, Clone)]
pub struct Timings {
    pub inter_room_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            inter_room_delay: DEFAULT_INTER_ROOM_DELAY,
            retry_delay: ArchiverConfig::default().retry_delay,
        }
    }
}

/// The monitor: polls every room and archives the ones that go live.
pub struct ShowroomPodcast {
    registry: Arc<RoomLockRegistry>,
    pool: Arc<WorkerPool>,
    scheduler: Scheduler,
    notifier: Option<Arc<dyn ErrorNotifier>>,
}

impl ShowroomPodcast {
    pub fn new(config: &AppConfig, deps: Dependencies) -> Self {
        Self::with_timings(config, deps, Timings::default())
    }

    pub fn with_timings(config: &AppConfig, deps: Dependencies, timings: Timings) -> Self {
        let registry = Arc::new(RoomLockRegistry::create(config.list_room_id.iter().copied()));
        let pool = Arc::new(WorkerPool::with_config(config.worker_pool_config()));

        let archiver = Arc::new(Archiver::new(
            deps.backend,
            deps.resolver,
            ArchiverConfig {
                output_dir: config.output_dir.clone(),
                retry_delay: timings.retry_delay,
                ..Default::default()
            },
        ));
        let dispatcher = Arc::new(PoolDispatcher::new(Arc::clone(&pool), archiver));
        let poller = Arc::new(RoomPoller::new(
            deps.liveness,
            Arc::clone(&registry),
            dispatcher,
        ));
        let scheduler = Scheduler::new(registry.room_ids().to_vec(), poller)
            .with_inter_room_delay(timings.inter_room_delay);

        Self {
            registry,
            pool,
            scheduler,
            notifier: deps.notifier,
        }
    }

    pub fn registry(&self) -> &RoomLockRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run until Ctrl-C or a fatal error.
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // Without a signal handler the only way out is a fatal error.
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `interrupt` resolves or a fatal error.
    ///
    /// Interruption returns [`Error::Interrupted`]. Any other error is logged,
    /// reported to the notifier if one is configured, and returned unchanged.
    pub async fn run_until<F>(&self, interrupt: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let token = CancellationToken::new();

        let result = tokio::select! {
            result = self.scheduler.run(&token) => result,
            _ = interrupt => {
                info!("Interrupt received, shutting down");
                Err(Error::Interrupted)
            }
        };

        token.cancel();
        self.pool.shutdown().await;

        if let Err(e) = &result {
            if !e.is_interrupt() {
                error!(kind = e.kind(), error = %e, "Monitoring stopped on a fatal error");
                self.notify(e).await;
            }
        }

        result
    }

    async fn notify(&self, error: &Error) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let report = ErrorReport::from_error(error);
        if let Err(e) = notifier.notify_error(&report).await {
            warn!(error = %e, "Failed to send error notification");
        }
    }
}
