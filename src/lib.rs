//! Best-effort client-side event delivery.
//!
//! Events are accepted without blocking, buffered in a bounded queue and
//! posted to a collector by a fixed pool of worker threads with retry and
//! exponential backoff. Delivery is never guaranteed: when the buffer is full
//! or the pipeline is stopping, events are dropped and counted.

mod cancel;
mod client;
mod config;
mod dispatcher;
mod event;
mod queue;
mod rate_limited_warner;
mod serialise;
mod user_agent;

#[cfg(test)]
mod test_utils;

pub use cancel::{CancelToken, Cancelled};
pub use client::TrackerClient;
pub use config::{
    API_PATH, ConfigError, DEFAULT_CACHE_SENTINEL, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_QUEUE_DEPTH, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_WORKER_COUNT, PipelineConfig, PipelineConfigBuilder,
};
pub use dispatcher::{
    AttemptError, BackoffPolicy, CACHE_HEADER, DispatchError, Dispatcher, HttpRequest,
    HttpResponse, SessionCache, Transport, TransportError, UreqTransport,
};
pub use event::{
    DEFAULT_LANGUAGE, DEFAULT_SCREEN, Event, EventKind, Payload, PayloadBuilder, PayloadError,
};
pub use queue::{DropReason, EnqueueError, EventQueue, PipelineStats, QueueState, StatsSnapshot};
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use serialise::serialise_event;
pub use user_agent::user_agent;
