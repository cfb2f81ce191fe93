//! Exponential backoff for upstream throttling
//!
//! Only rate-limit rejections are retried. Every other failure is returned
//! to the caller after a single invocation.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Upper bound (exclusive) of the random jitter added to each backoff
const MAX_JITTER_MS: u64 = 150;

/// Errors that can report whether they are a rate-limit rejection
pub trait Retryable {
    fn is_rate_limited(&self) -> bool;

    /// Server-provided hint for how long to wait, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first invocation
    pub retries: u32,
    /// Delay before the first retry; doubled for each subsequent one
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    /// Backoff before retry `attempt` (0-indexed), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(500))
    }
}

/// Run `op`, retrying rate-limit failures with exponential backoff
pub async fn with_retries<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && attempt < policy.retries => {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS));
                let backoff = policy.backoff(attempt) + jitter;
                // Never wait less than the server asked for
                let wait = err.retry_after().map_or(backoff, |hint| hint.max(backoff));

                tracing::warn!(
                    attempt = attempt + 1,
                    retries = policy.retries,
                    wait_ms = wait.as_millis() as u64,
                    "upstream rate limited: {}",
                    err
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
