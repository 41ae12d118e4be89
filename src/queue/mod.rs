//! Bounded event buffer and the worker pool that drains it.
//!
//! Callers only ever perform a non-blocking `try_send`; all network I/O
//! happens on the worker threads. The queue moves through
//! [`QueueState::Running`], [`QueueState::Draining`] and
//! [`QueueState::Stopped`] exactly once.

mod stats;
mod worker;


use std::io;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::event::Event;
use crate::rate_limited_warner::RateLimitedWarner;

pub use stats::{PipelineStats, StatsSnapshot};
use worker::{WorkerContext, spawn_worker};

const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Lifecycle of an [`EventQueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum QueueState {
    /// Accepting events; workers consuming.
    Running = 0,
    /// Shutdown requested; no new events, workers finishing the buffer.
    Draining = 1,
    /// Workers stopped or detached.
    Stopped = 2,
}

impl QueueState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Why an event was refused at enqueue time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    QueueFull,
    NotRunning,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue full",
            Self::NotRunning => "pipeline not running",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refused event, handed back to the caller.
#[derive(Debug, Error)]
#[error("event dropped: {reason}")]
pub struct EnqueueError {
    reason: DropReason,
    event: Box<Event>,
}

impl EnqueueError {
    pub fn reason(&self) -> DropReason {
        self.reason
    }

    pub fn into_event(self) -> Event {
        *self.event
    }
}

/// Bounded buffer feeding a fixed pool of delivery workers.
pub struct EventQueue {
    tx: RwLock<Option<Sender<Event>>>,
    rx: Receiver<Event>,
    state: AtomicU8,
    stats: Arc<PipelineStats>,
    dispatcher: Arc<Dispatcher>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    done_rx: Receiver<()>,
    shutdown_result: Mutex<Option<bool>>,
    shutdown_timeout: Duration,
    warner: RateLimitedWarner,
}

impl EventQueue {
    /// Spawn `config.worker_count` workers delivering through `dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned. Workers
    /// already started are cancelled before returning.
    pub fn start(config: &PipelineConfig, dispatcher: Arc<Dispatcher>) -> io::Result<Self> {
        Self::start_inner(config, dispatcher, None)
    }

    /// Like [`start`](Self::start), but every worker blocks on `barrier`
    /// before taking its first event.
    #[cfg(test)]
    pub(crate) fn start_paused(
        config: &PipelineConfig,
        dispatcher: Arc<Dispatcher>,
        barrier: Arc<Barrier>,
    ) -> io::Result<Self> {
        Self::start_inner(config, dispatcher, Some(barrier))
    }

    fn start_inner(
        config: &PipelineConfig,
        dispatcher: Arc<Dispatcher>,
        start_barrier: Option<Arc<Barrier>>,
    ) -> io::Result<Self> {
        let (tx, rx) = bounded(config.max_queue_depth);
        let (done_tx, done_rx) = bounded(config.worker_count);
        let stats = Arc::new(PipelineStats::new());
        let ctx = WorkerContext {
            rx: rx.clone(),
            dispatcher: Arc::clone(&dispatcher),
            stats: Arc::clone(&stats),
            cancel: dispatcher.cancel_token().clone(),
            poll_interval: config.poll_interval,
            done_tx,
            start_barrier,
        };

        let mut workers = Vec::with_capacity(config.worker_count);
        for id in 0..config.worker_count {
            stats.worker_started();
            match spawn_worker(id, ctx.clone()) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    stats.worker_stopped();
                    dispatcher.cancel_token().cancel();
                    return Err(err);
                }
            }
        }
        drop(ctx);

        info!(
            "femtotrack: started {} worker(s) for {} (capacity {})",
            config.worker_count,
            dispatcher.url(),
            config.max_queue_depth
        );
        Ok(Self {
            tx: RwLock::new(Some(tx)),
            rx,
            state: AtomicU8::new(QueueState::Running as u8),
            stats,
            dispatcher,
            workers: Mutex::new(workers),
            done_rx,
            shutdown_result: Mutex::new(None),
            shutdown_timeout: config.shutdown_timeout,
            warner: RateLimitedWarner::new(config.warn_interval),
        })
    }

    /// Queue `event` without blocking. Returns `false` if it was dropped.
    pub fn enqueue(&self, event: Event) -> bool {
        self.try_enqueue(event).is_ok()
    }

    /// Queue `event` without blocking, returning it on refusal.
    ///
    /// Refusals are counted as drops either way.
    ///
    /// # Errors
    ///
    /// [`DropReason::QueueFull`] when the buffer is at capacity and
    /// [`DropReason::NotRunning`] once shutdown has begun.
    pub fn try_enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        self.stats.reserve();
        let result = match self.tx.read().as_ref() {
            Some(tx) if self.state() == QueueState::Running => match tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(event)) => Err((DropReason::QueueFull, event)),
                Err(TrySendError::Disconnected(event)) => Err((DropReason::NotRunning, event)),
            },
            _ => Err((DropReason::NotRunning, event)),
        };
        match result {
            Ok(()) => Ok(()),
            Err((reason, event)) => {
                self.stats.record_rejected();
                self.warner.record_drop();
                self.warner.warn_if_due(|count| {
                    warn!("femtotrack: dropped {count} event(s) at enqueue: {reason}");
                });
                Err(EnqueueError {
                    reason,
                    event: Box::new(event),
                })
            }
        }
    }

    /// Block until every accepted event is settled or `timeout` elapses.
    ///
    /// Returns whether the pipeline went idle in time.
    ///
    /// A timeout too large to represent as a deadline waits indefinitely.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.stats.pending() == 0 {
                return true;
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    FLUSH_POLL_INTERVAL.min(deadline - now)
                }
                None => FLUSH_POLL_INTERVAL,
            };
            thread::sleep(pause);
        }
    }

    /// Stop accepting events, let workers drain until `timeout`, then cancel.
    ///
    /// Returns `true` when every accepted event was settled before the
    /// deadline. Later calls return the first call's result and do nothing.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let mut result = self.shutdown_result.lock();
        if let Some(drained) = *result {
            return drained;
        }

        self.state
            .store(QueueState::Draining as u8, Ordering::SeqCst);
        drop(self.tx.write().take());

        let finished = self.await_workers(Instant::now().checked_add(timeout));
        let drained = finished || self.stats.pending() == 0;
        if !finished {
            self.dispatcher.cancel_token().cancel();
            let discarded = self.discard_buffered();
            if discarded > 0 {
                warn!("femtotrack: shutdown timed out; discarded {discarded} buffered event(s)");
            }
        }
        self.reap_workers(finished);

        self.state.store(QueueState::Stopped as u8, Ordering::SeqCst);
        self.warner.flush(|count| {
            warn!("femtotrack: dropped {count} event(s) at enqueue");
        });
        info!("femtotrack: pipeline stopped ({})", self.stats.snapshot());
        *result = Some(drained);
        drained
    }

    /// [`shutdown`](Self::shutdown) with the configured drain budget.
    pub fn close(&self) -> bool {
        self.shutdown(self.shutdown_timeout)
    }

    // `None` means no deadline: wait for every worker to exit.
    fn await_workers(&self, deadline: Option<Instant>) -> bool {
        let expected = self.workers.lock().len();
        for _ in 0..expected {
            let Some(deadline) = deadline else {
                if self.done_rx.recv().is_err() {
                    return true;
                }
                continue;
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(()) => {}
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
        true
    }

    fn discard_buffered(&self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            self.stats.record_dropped();
            discarded += 1;
        }
        discarded
    }

    // Workers still blocked in an HTTP call are detached; they observe the
    // cancel token as soon as the call returns.
    fn reap_workers(&self, all_exited: bool) {
        for handle in self.workers.lock().drain(..) {
            if !all_exited && !handle.is_finished() {
                continue;
            }
            if handle.join().is_err() {
                warn!("femtotrack: worker thread panicked");
            }
        }
    }

    /// Number of events waiting in the buffer.
    pub fn queue_depth(&self) -> usize {
        self.rx.len()
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("state", &self.state())
            .field("depth", &self.queue_depth())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
