//! Sliding request-count gate
//!
//! Bounds the number of upstream calls admitted within any trailing window
//! (60 seconds in production). Callers that would exceed the limit are
//! suspended until the oldest admission leaves the window.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Added to computed waits so a woken caller lands just past the window edge
const SAFETY_MARGIN: Duration = Duration::from_millis(50);

/// Rate window configuration
#[derive(Debug, Clone)]
pub struct RateWindowConfig {
    /// Maximum admissions per window
    pub max_requests: usize,
    /// Window length
    pub window: Duration,
}

impl RateWindowConfig {
    pub fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateWindowConfig {
    fn default() -> Self {
        Self::per_minute(15)
    }
}

/// Shared admission gate
///
/// Keeps the admission timestamps of the current window. The lock is never
/// held across an await point.
pub struct RateWindow {
    config: RateWindowConfig,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    pub fn new(config: RateWindowConfig) -> Self {
        // A zero limit would park every caller forever
        let config = RateWindowConfig {
            max_requests: config.max_requests.max(1),
            ..config
        };
        tracing::debug!(
            max_requests = config.max_requests,
            window_ms = config.window.as_millis() as u64,
            "rate window initialized"
        );
        Self {
            admitted: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
        }
    }

    pub fn config(&self) -> &RateWindowConfig {
        &self.config
    }

    /// Wait until one more request fits in the window, then record it
    pub async fn acquire_slot(&self) {
        loop {
            let wait = match self.try_admit(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                limit = self.config.max_requests,
                "rate window full, waiting for a slot"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Admissions currently counted in the window
    pub fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock();
        Self::prune(&mut admitted, Instant::now(), self.config.window);
        admitted.len()
    }

    /// Admit at `now` or return how long to wait before re-checking
    fn try_admit(&self, now: Instant) -> Option<Duration> {
        let mut admitted = self.admitted.lock();
        Self::prune(&mut admitted, now, self.config.window);

        if admitted.len() < self.config.max_requests {
            admitted.push_back(now);
            return None;
        }

        let oldest = admitted.front().copied().unwrap_or(now);
        let elapsed = now.saturating_duration_since(oldest);
        Some(self.config.window.saturating_sub(elapsed) + SAFETY_MARGIN)
    }

    fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = admitted.front() {
            if now.saturating_duration_since(oldest) >= window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_without_waiting() {
        let window = RateWindow::new(RateWindowConfig::per_minute(3));
        let start = Instant::now();

        for _ in 0..3 {
            window.acquire_slot().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(window.in_window(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_oldest_admission_to_expire() {
        let window = RateWindow::new(RateWindowConfig::per_minute(2));
        let start = Instant::now();

        window.acquire_slot().await;
        window.acquire_slot().await;
        window.acquire_slot().await;

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_window_sees_more_than_limit() {
        let limit = 4;
        let window = Arc::new(RateWindow::new(RateWindowConfig {
            max_requests: limit,
            window: Duration::from_secs(10),
        }));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..13 {
            let window = window.clone();
            handles.push(tokio::spawn(async move {
                window.acquire_slot().await;
                Instant::now()
            }));
        }

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        for (i, &t) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|&&other| other.duration_since(t) < Duration::from_secs(10))
                .count();
            assert!(in_window <= limit, "window starting at {:?} saw {}", t - start, in_window);
        }

        // 13 requests at 4 per window need at least three full windows
        assert!(admitted.last().unwrap().duration_since(start) >= Duration::from_secs(30));
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let window = RateWindow::new(RateWindowConfig::per_minute(0));
        assert_eq!(window.config().max_requests, 1);
    }
}
