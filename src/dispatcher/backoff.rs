//! Exponential retry schedule used by the dispatcher.

use std::time::Duration;

/// Exponential backoff capped at `max`.
///
/// Retry `k` (counting from 1) waits `min(initial * 2^(k-1), max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay preceding attempt `attempt`; attempt 0 runs immediately.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        1u32.checked_shl(attempt - 1)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Sum of the delays preceding retries `1..=retries`.
    pub fn total_delay(&self, retries: u32) -> Duration {
        (1..=retries)
            .map(|attempt| self.delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}
