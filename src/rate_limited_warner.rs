//! Coalesces repeated drop warnings into periodic summaries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Default interval between drop summaries.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

fn now_ms() -> u64 {
    u64::try_from(EPOCH.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Helper that rate limits dropped-event warnings.
///
/// Callers bump the counter via [`record_drop`](Self::record_drop). The next
/// [`warn_if_due`](Self::warn_if_due) invokes the callback with the number of
/// drops since the last emission once `interval` has elapsed.
/// [`flush`](Self::flush) emits immediately if anything is pending.
#[derive(Debug)]
pub struct RateLimitedWarner {
    interval_ms: u64,
    last_warn: AtomicU64,
    dropped: AtomicU64,
    emitted: AtomicU64,
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl RateLimitedWarner {
    /// Create a warner whose first warning may be emitted immediately.
    pub fn new(interval: Duration) -> Self {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self {
            interval_ms,
            last_warn: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
        }
    }

    /// Increment the pending drop counter.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit a warning if the interval has elapsed since the last one.
    pub fn warn_if_due(&self, warn: impl FnOnce(u64)) {
        let now = now_ms();
        let prev = self.last_warn.load(Ordering::Relaxed);
        let first = self.emitted.load(Ordering::Relaxed) == 0;
        if !first && now.saturating_sub(prev) < self.interval_ms {
            return;
        }
        if self
            .last_warn
            .compare_exchange(prev, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            self.emitted.fetch_add(1, Ordering::Relaxed);
            warn(count);
        }
    }

    /// Immediately warn about any pending drops.
    pub fn flush(&self, warn: impl FnOnce(u64)) {
        let count = self.dropped.swap(0, Ordering::Relaxed);
        if count > 0 {
            self.emitted.fetch_add(1, Ordering::Relaxed);
            self.last_warn.store(now_ms(), Ordering::Relaxed);
            warn(count);
        }
    }
}
