//! Worker threads consuming the shared event buffer.
//!
//! Each worker waits on the buffer, the cancel signal, and a poll timeout
//! using `select!`. Events go to the dispatcher one at a time; the outcome is
//! recorded in the shared statistics before the next event is taken.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, error, trace};

use crate::cancel::CancelToken;
use crate::dispatcher::Dispatcher;
use crate::event::Event;

use super::stats::PipelineStats;

/// Everything a worker needs, cloned once per thread.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) rx: Receiver<Event>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) stats: Arc<PipelineStats>,
    pub(crate) cancel: CancelToken,
    pub(crate) poll_interval: Duration,
    pub(crate) done_tx: Sender<()>,
    /// Test hook: workers wait here before consuming anything.
    pub(crate) start_barrier: Option<Arc<Barrier>>,
}

/// Marks the worker as stopped when its thread exits, even on panic.
struct ExitGuard {
    stats: Arc<PipelineStats>,
    done_tx: Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.stats.worker_stopped();
        let _ = self.done_tx.send(());
    }
}

/// Spawn worker `id`.
///
/// The caller has already counted the worker as active; the thread undoes
/// that when it exits.
pub(crate) fn spawn_worker(id: usize, ctx: WorkerContext) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("femtotrack-worker-{id}"))
        .spawn(move || run(id, ctx))
}

fn run(id: usize, ctx: WorkerContext) {
    let _guard = ExitGuard {
        stats: Arc::clone(&ctx.stats),
        done_tx: ctx.done_tx.clone(),
    };
    if let Some(barrier) = &ctx.start_barrier {
        barrier.wait();
    }
    debug!("femtotrack: worker {id} started");
    loop {
        select! {
            recv(ctx.rx) -> msg => match msg {
                Ok(event) => process(id, &ctx, event),
                Err(_) => {
                    debug!("femtotrack: worker {id} drained the closed buffer");
                    break;
                }
            },
            recv(ctx.cancel.signal()) -> _ => {
                debug!("femtotrack: worker {id} cancelled");
                break;
            },
            default(ctx.poll_interval) => {
                trace!("femtotrack: worker {id} idle");
            }
        }
    }
}

fn process(id: usize, ctx: &WorkerContext, mut event: Event) {
    debug!("femtotrack: worker {id} processing {event}");
    let outcome = catch_unwind(AssertUnwindSafe(|| ctx.dispatcher.send(&mut event)));
    match outcome {
        Ok(true) => ctx.stats.record_processed(),
        Ok(false) => ctx.stats.record_dropped(),
        Err(_) => {
            error!("femtotrack: worker {id} panicked while sending {event}; event dropped");
            ctx.stats.record_dropped();
        }
    }
}
