//! Builder for [`PipelineConfig`].
//!
//! Setters only record values; [`PipelineConfigBuilder::build`] validates the
//! whole set and reports the first offending field.

use std::time::Duration;

use super::{ConfigError, PipelineConfig};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for [`PipelineConfig`] values.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfigBuilder {
    endpoint: String,
    website_id: String,
    enabled: Option<bool>,
    max_queue_depth: Option<usize>,
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    worker_count: Option<usize>,
    cache_sentinel: Option<Option<String>>,
    poll_interval_ms: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
}

impl PipelineConfigBuilder {
    /// Create a builder for the collector at `endpoint` and site `website_id`.
    pub fn new(endpoint: impl Into<String>, website_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            website_id: website_id.into(),
            ..Self::default()
        }
    }

    option_setter!(
        #[doc = "Enable or disable tracking. Defaults to enabled."]
        with_enabled,
        enabled,
        bool
    );
    option_setter!(
        #[doc = "Set the bounded queue capacity."]
        with_max_queue_depth,
        max_queue_depth,
        usize
    );
    option_setter!(
        #[doc = "Set the number of retries after the first attempt."]
        with_max_retries,
        max_retries,
        u32
    );
    option_setter!(
        #[doc = "Set the delay before the first retry in milliseconds."]
        with_initial_backoff_ms,
        initial_backoff_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the retry delay ceiling in milliseconds."]
        with_max_backoff_ms,
        max_backoff_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the per-attempt request timeout in milliseconds."]
        with_request_timeout_ms,
        request_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the number of worker threads."]
        with_worker_count,
        worker_count,
        usize
    );
    option_setter!(
        #[doc = "Set the idle poll interval for workers in milliseconds."]
        with_poll_interval_ms,
        poll_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the drain budget used by `close` in milliseconds."]
        with_shutdown_timeout_ms,
        shutdown_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the interval between drop warnings in milliseconds."]
        with_warn_interval_ms,
        warn_interval_ms,
        u64
    );

    /// Override the response cache value that is never stored.
    ///
    /// `None` disables sentinel filtering entirely.
    pub fn with_cache_sentinel(mut self, sentinel: Option<String>) -> Self {
        self.cache_sentinel = Some(sentinel);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_identity()?;
        self.validate_counts()?;
        self.validate_durations()?;
        Ok(())
    }

    fn validate_identity(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "endpoint must not be empty".into(),
            ));
        }
        if self.website_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "website_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn validate_counts(&self) -> Result<(), ConfigError> {
        if let Some(depth) = self.max_queue_depth {
            ensure_positive!(depth, "max_queue_depth")?;
        }
        if let Some(workers) = self.worker_count {
            ensure_positive!(workers, "worker_count")?;
        }
        Ok(())
    }

    fn validate_durations(&self) -> Result<(), ConfigError> {
        let positive = [
            (self.initial_backoff_ms, "initial_backoff_ms"),
            (self.max_backoff_ms, "max_backoff_ms"),
            (self.request_timeout_ms, "request_timeout_ms"),
            (self.poll_interval_ms, "poll_interval_ms"),
        ];
        for (value, field) in positive {
            if let Some(ms) = value {
                ensure_positive!(ms, field)?;
            }
        }
        Ok(())
    }

    /// Validate the collected settings and produce a [`PipelineConfig`].
    pub fn build(&self) -> Result<PipelineConfig, ConfigError> {
        self.validate()?;

        let defaults = PipelineConfig::default();
        Ok(PipelineConfig {
            endpoint: self.endpoint.trim().trim_end_matches('/').to_string(),
            website_id: self.website_id.trim().to_string(),
            enabled: self.enabled.unwrap_or(defaults.enabled),
            max_queue_depth: self.max_queue_depth.unwrap_or(defaults.max_queue_depth),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff: self
                .initial_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: self
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
            request_timeout: self
                .request_timeout_ms
                .map_or(defaults.request_timeout, Duration::from_millis),
            worker_count: self.worker_count.unwrap_or(defaults.worker_count),
            cache_sentinel: self
                .cache_sentinel
                .clone()
                .unwrap_or(defaults.cache_sentinel),
            poll_interval: self
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            shutdown_timeout: self
                .shutdown_timeout_ms
                .map_or(defaults.shutdown_timeout, Duration::from_millis),
            warn_interval: self
                .warn_interval_ms
                .map_or(defaults.warn_interval, Duration::from_millis),
        })
    }
}
