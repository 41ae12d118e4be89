//! Lock-free pipeline counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the queue, its workers and the facade.
///
/// `dropped` includes `rejected` (events refused at enqueue time), so every
/// accepted event eventually lands in exactly one of `processed` or
/// `dropped - rejected`, after which it leaves `pending`.
///
/// `queued` is raised before an event becomes visible to workers and taken
/// back if the enqueue is refused. A snapshot reads the settled counters
/// first, so `processed + (dropped - rejected) <= queued` holds for every
/// snapshot, even while workers and producers are running.
#[derive(Debug, Default)]
pub struct PipelineStats {
    queued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    pending: AtomicU64,
    active_workers: AtomicUsize,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub queued: u64,
    pub processed: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub pending: u64,
    pub active_workers: usize,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={} processed={} dropped={} (rejected={}) pending={} workers={}",
            self.queued,
            self.processed,
            self.dropped,
            self.rejected,
            self.pending,
            self.active_workers
        )
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events accepted into the buffer, including any whose enqueue is in
    /// progress.
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::SeqCst)
    }

    /// Events the collector accepted.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Events abandoned at any stage, including enqueue rejections.
    pub fn dropped(&self) -> u64 {
        self.failed.load(Ordering::SeqCst) + self.rejected()
    }

    /// Events refused at enqueue time.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Accepted events without a final outcome yet.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Workers currently alive.
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // Settled counters before `queued`: `queued` never lags an outcome.
        let processed = self.processed();
        let failed = self.failed.load(Ordering::SeqCst);
        let rejected = self.rejected();
        let pending = self.pending();
        StatsSnapshot {
            queued: self.queued(),
            processed,
            dropped: failed + rejected,
            rejected,
            pending,
            active_workers: self.active_workers(),
        }
    }

    // Raised before the event becomes visible to workers so neither counter
    // can lag the event's outcome.
    pub(crate) fn reserve(&self) {
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        self.queued.fetch_sub(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn record_dropped(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn worker_stopped(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}
