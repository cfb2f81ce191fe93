//! Request governance for the upstream generation service
//!
//! All upstream traffic funnels through a [`RequestGovernor`]:
//!
//! - [`BoundedQueue`] caps concurrent calls and keeps FIFO order
//! - [`RateWindow`] caps calls per minute
//! - [`with_retries`] absorbs residual 429s with exponential backoff
//! - [`SpreadScheduler`] paces multi-chunk work by input size
//!
//! The governor is built once per process (see `AppState`) and shared by
//! handle. Tests construct their own instances.

mod queue;
mod rate_window;
mod retry;
mod spread;

use std::future::Future;
use std::sync::Arc;

pub use queue::{BoundedQueue, QueueConfig, QueueError, QueueStats};
pub use rate_window::{RateWindow, RateWindowConfig};
pub use retry::{with_retries, RetryPolicy, Retryable};
pub use spread::{SpreadConfig, SpreadScheduler};

/// Governor configuration
#[derive(Debug, Clone, Default)]
pub struct GovernorConfig {
    pub queue: QueueConfig,
    pub rate: RateWindowConfig,
    pub retry: RetryPolicy,
}

/// Queue + rate window + retry policy, shared by every generation request
#[derive(Clone)]
pub struct RequestGovernor {
    queue: BoundedQueue,
    window: Arc<RateWindow>,
    retry: RetryPolicy,
}

impl RequestGovernor {
    /// Create a governor; spawns the queue dispatcher on the current runtime
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            queue: BoundedQueue::new(config.queue),
            window: Arc::new(RateWindow::new(config.rate)),
            retry: config.retry,
        }
    }

    /// Run one upstream call under full governance
    ///
    /// Waits for a queue slot, then a rate slot, then runs `call` with
    /// rate-limit retries. The outer `Result` reports queue failures, the
    /// inner one the call itself.
    pub async fn run<T, E, F, Fut>(&self, call: F) -> Result<Result<T, E>, QueueError>
    where
        T: Send + 'static,
        E: Retryable + std::fmt::Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let window = self.window.clone();
        let retry = self.retry.clone();

        self.queue
            .submit(async move {
                tracing::debug!(phase = "rate_gated", "waiting for rate slot");
                window.acquire_slot().await;
                tracing::debug!(phase = "calling", "calling upstream");
                with_retries(&retry, call).await
            })
            .await
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn rate_window(&self) -> &RateWindow {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("throttled")]
    struct Throttled;

    impl Retryable for Throttled {
        fn is_rate_limited(&self) -> bool {
            true
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_counts_one_rate_slot_per_admission() {
        let governor = RequestGovernor::new(GovernorConfig {
            retry: RetryPolicy::new(2, Duration::from_millis(10)),
            ..Default::default()
        });
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = governor
            .run(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Throttled)
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(governor.rate_window().in_window(), 1);
    }
}
