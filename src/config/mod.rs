//! Pipeline configuration.
//!
//! [`PipelineConfigBuilder`] validates user input and produces an immutable
//! [`PipelineConfig`]; the INI loader in `file` feeds the same builder.

mod builder;
mod file;


use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::dispatcher::BackoffPolicy;
use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

pub use builder::PipelineConfigBuilder;

/// Path appended to the endpoint base for event submission.
pub const API_PATH: &str = "/api/send";
/// Default bounded queue capacity.
pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 10_000;
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
/// Default ceiling for retry delays.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Default timeout applied to each HTTP attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of worker threads.
pub const DEFAULT_WORKER_COUNT: usize = 1;
/// Default interval at which idle workers re-check the pipeline state.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default drain budget used by `close` and `Drop`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// Placeholder cache value the collector returns when it has nothing to cache.
pub const DEFAULT_CACHE_SENTINEL: &str = "boop";

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid user supplied configuration.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    /// The configuration source could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// Underlying I/O error whilst reading a configuration file.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Immutable settings shared by every pipeline component.
///
/// The worst-case wall-clock cost of delivering one event is
/// `(max_retries + 1) * request_timeout` plus the sum of all backoff delays;
/// see [`worst_case_delivery_time`](Self::worst_case_delivery_time). Pick
/// `flush` and shutdown timeouts with that bound in mind.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Collector base URL without a trailing slash.
    pub endpoint: String,
    /// Website identifier stamped on every payload.
    pub website_id: String,
    /// When false, the client accepts calls but never queues events.
    pub enabled: bool,
    /// Bounded queue capacity.
    pub max_queue_depth: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Ceiling for retry delays.
    pub max_backoff: Duration,
    /// Timeout applied to each HTTP attempt.
    pub request_timeout: Duration,
    /// Number of worker threads.
    pub worker_count: usize,
    /// Response cache value that must never be stored, if any.
    pub cache_sentinel: Option<String>,
    /// Idle poll interval for workers.
    pub poll_interval: Duration,
    /// Drain budget used by `close` and `Drop`.
    pub shutdown_timeout: Duration,
    /// Interval between rate-limited drop warnings.
    pub warn_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            website_id: String::new(),
            enabled: true,
            max_queue_depth: DEFAULT_MAX_QUEUE_DEPTH,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            worker_count: DEFAULT_WORKER_COUNT,
            cache_sentinel: Some(DEFAULT_CACHE_SENTINEL.into()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Start a builder for the collector at `endpoint` and site `website_id`.
    pub fn builder(
        endpoint: impl Into<String>,
        website_id: impl Into<String>,
    ) -> PipelineConfigBuilder {
        PipelineConfigBuilder::new(endpoint, website_id)
    }

    /// Full URL events are posted to.
    pub fn send_url(&self) -> String {
        format!("{}{API_PATH}", self.endpoint)
    }

    /// Retry delay schedule derived from the backoff settings.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.initial_backoff, self.max_backoff)
    }

    /// Upper bound on the time one event can spend inside the dispatcher.
    pub fn worst_case_delivery_time(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        self.request_timeout
            .saturating_mul(attempts)
            .saturating_add(self.backoff_policy().total_delay(self.max_retries))
    }
}
