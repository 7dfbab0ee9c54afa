//! Bounded pool running archive tasks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum concurrent archive tasks.
    pub max_workers: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Runs at most `max_workers` archive tasks at a time.
///
/// Submission never waits for a free worker: the task is spawned right away
/// and waits for a permit itself.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    semaphore: Arc<Semaphore>,
    active_workers: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::with_config(WorkerPoolConfig::default())
    }

    pub fn with_config(config: WorkerPoolConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        info!("Starting worker pool with {} max workers", max_workers);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            config: WorkerPoolConfig { max_workers },
            active_workers: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            cancellation_token: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Queue an archive task for `room_id`.
    ///
    /// `task` receives a token cancelled on [`shutdown`](Self::shutdown). If
    /// the pool shuts down before a worker frees up, `task` is dropped without
    /// running, dropping everything it captured.
    pub fn submit<F, Fut>(&self, room_id: u64, task: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<u32>> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        let join_set = tasks
            .as_mut()
            .ok_or_else(|| Error::WorkerPool("worker pool is shut down".to_string()))?;

        Self::reap(join_set);

        let semaphore = Arc::clone(&self.semaphore);
        let token = self.cancellation_token.child_token();
        let active_workers = Arc::clone(&self.active_workers);
        let completed = Arc::clone(&self.completed);
        let failed = Arc::clone(&self.failed);

        join_set.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(room_id, "Archive task cancelled before it started");
                    return;
                }
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            active_workers.fetch_add(1, Ordering::SeqCst);
            let result = task(token).await;
            active_workers.fetch_sub(1, Ordering::SeqCst);
            drop(permit);

            match result {
                Ok(attempts) => {
                    completed.fetch_add(1, Ordering::SeqCst);
                    debug!(room_id, attempts, "Archive task completed");
                }
                Err(Error::Cancelled) => {
                    debug!(room_id, "Archive task cancelled");
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::SeqCst);
                    error!(room_id, kind = e.kind(), error = %e, "Archive task failed");
                }
            }
        });

        debug!(room_id, pending = join_set.len(), "Archive task submitted");
        Ok(())
    }

    /// Drop finished tasks from the join set.
    fn reap(join_set: &mut JoinSet<()>) {
        while let Some(result) = join_set.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Archive task panicked: {}", e);
                }
            }
        }
    }

    /// Wait until every submitted task has finished, without cancelling them.
    pub async fn wait_idle(&self) {
        loop {
            let join_set = {
                let mut tasks = self.tasks.lock();
                match tasks.as_mut() {
                    Some(join_set) if !join_set.is_empty() => std::mem::take(join_set),
                    _ => return,
                }
            };
            Self::join(join_set).await;
        }
    }

    /// Cancel every task and wait for all of them to finish.
    pub async fn shutdown(&self) {
        info!("Stopping worker pool");
        self.cancellation_token.cancel();

        // Take the join set out of the mutex before awaiting
        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(join_set) = join_set {
            Self::join(join_set).await;
        }

        info!("Worker pool stopped");
    }

    async fn join(mut join_set: JoinSet<()>) {
        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                warn!("Archive task did not finish cleanly: {}", e);
            }
        }
    }

    /// Tasks currently holding a worker.
    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Tasks that finished without error.
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Tasks that ended with an error other than cancellation.
    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }

    /// Check if the pool is running.
    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn pool(max_workers: usize) -> WorkerPool {
        WorkerPool::with_config(WorkerPoolConfig { max_workers })
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_default_config_uses_available_cpus() {
        assert!(WorkerPoolConfig::default().max_workers >= 1);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        assert_eq!(pool(0).max_workers(), 1);
    }

    #[tokio::test]
    async fn test_counts_outcomes() {
        let pool = pool(2);
        pool.submit(1, |_| async { Ok(3) }).unwrap();
        pool.submit(2, |_| async { Err(Error::MaxRetriesExceeded { attempts: 5 }) })
            .unwrap();
        pool.submit(3, |_| async { Err(Error::Cancelled) }).unwrap();

        pool.wait_idle().await;
        assert_eq!(pool.completed_count(), 1);
        assert_eq!(pool.failed_count(), 1);
        assert_eq!(pool.active_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_a_worker() {
        let pool = pool(1);
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        pool.submit(1, move |_| async move {
            gate.notified().await;
            Ok(1)
        })
        .unwrap();
        settle().await;
        assert_eq!(pool.active_count(), 1);

        // The only worker is busy; this must still return immediately.
        pool.submit(2, |_| async { Ok(1) }).unwrap();
        settle().await;
        assert_eq!(pool.completed_count(), 0);

        release.notify_one();
        pool.wait_idle().await;
        assert_eq!(pool.completed_count(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_tasks() {
        let pool = pool(1);
        pool.submit(1, |token| async move {
            token.cancelled().await;
            Err(Error::Cancelled)
        })
        .unwrap();
        settle().await;

        tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
            .await
            .unwrap();
        assert!(!pool.is_running());
        assert_eq!(pool.failed_count(), 0);
        assert!(pool.submit(2, |_| async { Ok(1) }).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_drops_tasks_waiting_for_a_worker() {
        let pool = pool(1);
        let queued_ran = Arc::new(AtomicUsize::new(0));
        let witness = Arc::new(());

        pool.submit(1, |token| async move {
            token.cancelled().await;
            Err(Error::Cancelled)
        })
        .unwrap();

        let ran = Arc::clone(&queued_ran);
        let captured = Arc::clone(&witness);
        pool.submit(2, move |_| async move {
            let _captured = captured;
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .unwrap();
        settle().await;
        assert_eq!(Arc::strong_count(&witness), 2);

        pool.shutdown().await;
        assert_eq!(queued_ran.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&witness), 1);
    }
}
