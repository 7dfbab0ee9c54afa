//! Attempt-bounded retry driver.
//!
//! [`RetrySequencer`] pulls one attempt at a time from an [`Attempter`]. How
//! many attempts are allowed is decided here; what counts as worth another
//! attempt is decided by the attempter.

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of attempts for one archive task.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Result of one successful pull from an [`Attempter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSignal {
    /// The attempt hit a retriable condition; another attempt may follow.
    Retry,
    /// There is no more work; the sequence ends without error.
    Finished,
}

/// The attempt budget ran out before the work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no success after {attempts} attempts")]
pub struct RetriesExhausted {
    pub attempts: u32,
}

/// Performs a single attempt of a unit of work.
#[async_trait]
pub trait Attempter: Send {
    type Error: Send;

    /// Run attempt number `attempt` (1-based).
    ///
    /// An `Err` is fatal: the sequence stops and no budget is spent on it.
    async fn attempt(&mut self, attempt: u32) -> Result<AttemptSignal, Self::Error>;
}

/// Lazy sequence of attempts with a fixed budget.
///
/// Each call to [`next_attempt`](Self::next_attempt) performs at most one
/// attempt:
/// - `Some(Ok(()))` after a retriable attempt,
/// - `None` once the attempter reports [`AttemptSignal::Finished`],
/// - `Some(Err(_))` for a fatal attempt error, or for the pull after the
///   budget is spent. Both end the sequence.
#[derive(Debug)]
pub struct RetrySequencer<A> {
    attempter: A,
    budget: u32,
    attempts: u32,
    done: bool,
}

impl<A> RetrySequencer<A>
where
    A: Attempter,
    A::Error: From<RetriesExhausted>,
{
    pub fn new(attempter: A, budget: u32) -> Self {
        Self {
            attempter,
            budget,
            attempts: 0,
            done: false,
        }
    }

    /// Attempts performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    pub async fn next_attempt(&mut self) -> Option<Result<(), A::Error>> {
        if self.done {
            return None;
        }

        if self.attempts >= self.budget {
            self.done = true;
            warn!(attempts = self.attempts, "Attempt budget exhausted");
            return Some(Err(RetriesExhausted {
                attempts: self.attempts,
            }
            .into()));
        }

        self.attempts += 1;
        match self.attempter.attempt(self.attempts).await {
            Ok(AttemptSignal::Retry) => {
                debug!(
                    attempt = self.attempts,
                    budget = self.budget,
                    "Attempt will be retried"
                );
                Some(Ok(()))
            }
            Ok(AttemptSignal::Finished) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    /// Drive the sequence to its end and return the number of attempts made.
    pub async fn run(mut self) -> Result<u32, A::Error> {
        while let Some(item) = self.next_attempt().await {
            item?;
        }
        Ok(self.attempts)
    }

    /// View the sequence as a stream of attempt results.
    pub fn into_stream(self) -> impl Stream<Item = Result<(), A::Error>> {
        futures::stream::unfold(self, |mut sequencer| async move {
            let item = sequencer.next_attempt().await?;
            Some((item, sequencer))
        })
    }
}
