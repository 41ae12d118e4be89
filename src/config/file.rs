//! INI loading for [`PipelineConfig`].
//!
//! Settings live in a `[pipeline]` section. Every value is passed through
//! [`PipelineConfigBuilder`] so file-based and programmatic configuration share
//! the same validation.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::{ConfigError, PipelineConfig, PipelineConfigBuilder};

/// Section holding pipeline settings.
pub(crate) const SECTION: &str = "pipeline";

const KNOWN_KEYS: &[&str] = &[
    "endpoint",
    "website_id",
    "enabled",
    "max_queue_depth",
    "max_retries",
    "initial_backoff_ms",
    "max_backoff_ms",
    "request_timeout_ms",
    "worker_count",
    "cache_sentinel",
    "poll_interval_ms",
    "shutdown_timeout_ms",
    "warn_interval_ms",
];

impl PipelineConfig {
    /// Load a configuration from the INI file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] or [`ConfigError::InvalidConfig`] when its
    /// contents are malformed.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ConfigError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} doesn't exist", path.display()),
            )),
            _ => ConfigError::Io(err),
        })?;
        Self::from_ini_str(&text)
    }

    /// Parse a configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let section = ini
            .section(Some(SECTION))
            .ok_or_else(|| ConfigError::Parse(format!("missing [{SECTION}] section")))?;
        builder_from_section(section)?.build()
    }
}

fn builder_from_section(section: &Properties) -> Result<PipelineConfigBuilder, ConfigError> {
    for (key, _) in section.iter() {
        if !KNOWN_KEYS.contains(&key) {
            log::warn!("femtotrack: ignoring unknown configuration key '{key}'");
        }
    }

    let endpoint = required(section, "endpoint")?;
    let website_id = required(section, "website_id")?;
    let mut builder = PipelineConfigBuilder::new(endpoint, website_id);

    if let Some(enabled) = parsed::<bool>(section, "enabled")? {
        builder = builder.with_enabled(enabled);
    }
    if let Some(depth) = parsed::<usize>(section, "max_queue_depth")? {
        builder = builder.with_max_queue_depth(depth);
    }
    if let Some(retries) = parsed::<u32>(section, "max_retries")? {
        builder = builder.with_max_retries(retries);
    }
    if let Some(ms) = parsed::<u64>(section, "initial_backoff_ms")? {
        builder = builder.with_initial_backoff_ms(ms);
    }
    if let Some(ms) = parsed::<u64>(section, "max_backoff_ms")? {
        builder = builder.with_max_backoff_ms(ms);
    }
    if let Some(ms) = parsed::<u64>(section, "request_timeout_ms")? {
        builder = builder.with_request_timeout_ms(ms);
    }
    if let Some(workers) = parsed::<usize>(section, "worker_count")? {
        builder = builder.with_worker_count(workers);
    }
    if let Some(ms) = parsed::<u64>(section, "poll_interval_ms")? {
        builder = builder.with_poll_interval_ms(ms);
    }
    if let Some(ms) = parsed::<u64>(section, "shutdown_timeout_ms")? {
        builder = builder.with_shutdown_timeout_ms(ms);
    }
    if let Some(ms) = parsed::<u64>(section, "warn_interval_ms")? {
        builder = builder.with_warn_interval_ms(ms);
    }
    if let Some(sentinel) = section.get("cache_sentinel") {
        let sentinel = sentinel.trim();
        builder = builder.with_cache_sentinel((!sentinel.is_empty()).then(|| sentinel.to_string()));
    }
    Ok(builder)
}

fn required<'a>(section: &'a Properties, key: &str) -> Result<&'a str, ConfigError> {
    section
        .get(key)
        .ok_or_else(|| ConfigError::InvalidConfig(format!("{key} is required")))
}

fn parsed<T: FromStr>(section: &Properties, key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    section
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| ConfigError::Parse(format!("{key}: {err}")))
        })
        .transpose()
}
