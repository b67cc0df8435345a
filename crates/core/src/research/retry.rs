use crate::clock::Clock;
use crate::error::{ErrorKind, StageError};
use std::future::Future;
use std::time::Duration;

/// Declarative retry behaviour shared by research calls and email delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay after the n-th failed attempt; the last entry repeats if the schedule is short.
    pub backoff: Vec<Duration>,
    pub retryable: Vec<ErrorKind>,
}

impl RetryPolicy {
    pub fn research() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_secs(2), Duration::from_secs(4)],
            retryable: vec![ErrorKind::TransientApi],
        }
    }

    pub fn delivery() -> Self {
        Self {
            max_attempts: 2,
            backoff: vec![Duration::from_secs(5)],
            retryable: vec![ErrorKind::Delivery],
        }
    }

    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        attempt < self.max_attempts && self.retryable.contains(&kind)
    }

    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.backoff
            .get(idx)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable kind, or attempts run out.
    ///
    /// Returns the final result together with the number of attempts made.
    pub async fn run<T, F, Fut>(
        &self,
        clock: &dyn Clock,
        target: &str,
        mut op: F,
    ) -> (Result<T, StageError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if self.should_retry(err.kind, attempt) => {
                    let backoff = self.backoff_after(attempt);
                    tracing::warn!(
                        target_name = target,
                        attempt,
                        ?backoff,
                        error = %err,
                        "attempt failed; retrying"
                    );
                    clock.sleep(backoff).await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}
