//! Size-proportional pacing
//!
//! Large documents turn into many back-to-back generation calls. The spread
//! scheduler stretches those calls out over a delay that grows with the input
//! size, so a single big upload does not burn through the upstream quota.

use std::time::Duration;

/// Spread configuration
#[derive(Debug, Clone)]
pub struct SpreadConfig {
    /// When false, `compute_delay` is always zero
    pub enabled: bool,
    /// Inputs at or below this size get no spread delay
    pub min_chars: usize,
    /// Inputs at or above this size get `max_delay`
    pub max_chars: usize,
    /// Total delay for the largest inputs
    pub max_delay: Duration,
    /// Pause between chunks when the spread delay is zero
    pub fixed_pause: Duration,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_chars: 12_000,
            max_chars: 120_000,
            max_delay: Duration::from_secs(20),
            fixed_pause: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpreadScheduler {
    config: SpreadConfig,
}

impl SpreadScheduler {
    pub fn new(config: SpreadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpreadConfig {
        &self.config
    }

    /// Total pacing delay for an input of `chars` characters
    pub fn compute_delay(&self, chars: usize) -> Duration {
        let SpreadConfig {
            enabled,
            min_chars,
            max_chars,
            max_delay,
            ..
        } = self.config;

        if !enabled || chars <= min_chars {
            return Duration::ZERO;
        }
        if chars >= max_chars || max_chars <= min_chars {
            return max_delay;
        }

        let ratio = (chars - min_chars) as f64 / (max_chars - min_chars) as f64;
        max_delay.mul_f64(ratio)
    }

    /// Pause inserted before every chunk except the first
    ///
    /// The spread delay is divided across the `chunks - 1` transitions. When
    /// it is zero the fixed pause applies instead, never both.
    pub fn chunk_pause(&self, chars: usize, chunks: usize) -> Duration {
        if chunks <= 1 {
            return Duration::ZERO;
        }

        let spread = self.compute_delay(chars);
        if spread.is_zero() {
            return self.config.fixed_pause;
        }
        spread / (chunks - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> SpreadScheduler {
        SpreadScheduler::new(SpreadConfig {
            enabled: true,
            min_chars: 10_000,
            max_chars: 110_000,
            max_delay: Duration::from_secs(10),
            fixed_pause: Duration::from_millis(750),
        })
    }

    #[test]
    fn test_no_delay_below_threshold() {
        let s = scheduler();
        assert_eq!(s.compute_delay(0), Duration::ZERO);
        assert_eq!(s.compute_delay(9_999), Duration::ZERO);
        assert_eq!(s.compute_delay(10_000), Duration::ZERO);
    }

    #[test]
    fn test_capped_above_threshold() {
        let s = scheduler();
        assert_eq!(s.compute_delay(110_000), Duration::from_secs(10));
        assert_eq!(s.compute_delay(5_000_000), Duration::from_secs(10));
    }

    #[test]
    fn test_linear_between_thresholds() {
        let s = scheduler();
        assert_eq!(s.compute_delay(60_000), Duration::from_secs(5));

        let mut previous = Duration::ZERO;
        for chars in (0..=120_000).step_by(1_000) {
            let delay = s.compute_delay(chars);
            assert!(delay >= previous, "delay dropped at {} chars", chars);
            previous = delay;
        }
    }

    #[test]
    fn test_disabled_spread_is_zero() {
        let s = SpreadScheduler::new(SpreadConfig {
            enabled: false,
            ..scheduler().config().clone()
        });
        assert_eq!(s.compute_delay(1_000_000), Duration::ZERO);
        // Fixed pause takes over between chunks
        assert_eq!(s.chunk_pause(1_000_000, 4), Duration::from_millis(750));
    }

    #[test]
    fn test_chunk_pause_splits_spread() {
        let s = scheduler();
        assert_eq!(s.chunk_pause(110_000, 5), Duration::from_millis(2_500));
        assert_eq!(s.chunk_pause(110_000, 1), Duration::ZERO);
        // Small input, several chunks: fixed pause only
        assert_eq!(s.chunk_pause(9_000, 3), Duration::from_millis(750));
    }
}
