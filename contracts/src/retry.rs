//! Bounded retry for outbound HTTP calls.
//!
//! Both clients (orchestrator → hub, hub → worker) use the same envelope:
//! a fixed number of attempts, a multiplicative backoff between them, and a
//! hard total budget that caps the whole sequence. The caller decides which
//! errors are worth another attempt.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub total_budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            total_budget: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `initial * factor^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let millis =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(retry as i32);
        Duration::from_millis(millis as u64)
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until it succeeds, the error is not retryable, the
    /// attempt count is exhausted, or the next backoff would overrun the
    /// total budget. Always returns the last error observed.
    pub async fn execute<T, E, F, Fut, R>(&self, mut operation: F, should_retry: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts || !should_retry(&error) {
                        return Err(error);
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    if started.elapsed() + delay > self.policy.total_budget {
                        return Err(error);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
