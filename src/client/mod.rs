//! Caller-facing tracking facade.
//!
//! [`TrackerClient`] stamps every event with the current identity (a logged
//! in user, or else a per-process session id) and hands it to the pipeline
//! without blocking. None of its methods raise; failures surface as `false`
//! and in the statistics.


use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineConfig};
use crate::dispatcher::{Dispatcher, Transport};
use crate::event::{Event, Payload, PayloadBuilder, PayloadError};
use crate::queue::{EventQueue, StatsSnapshot};

const IDENTIFY_NAME: &str = "identify";
const IDENTIFY_URL: &str = "/";
const IDENTIFY_TITLE: &str = "User Identified";

/// Thread-safe client owning one delivery pipeline.
///
/// Call [`initialize`](Self::initialize) before tracking. Dropping the
/// client shuts the pipeline down with the configured drain budget.
pub struct TrackerClient {
    config: PipelineConfig,
    session_id: String,
    current_user: RwLock<Option<Arc<str>>>,
    pipeline: RwLock<Option<Arc<EventQueue>>>,
    initialized: AtomicBool,
    lifecycle: Mutex<()>,
    transport: Option<Arc<dyn Transport>>,
}

impl TrackerClient {
    pub fn new(config: PipelineConfig) -> Self {
        Self::build(config, None)
    }

    /// Client whose pipeline posts through `transport` instead of HTTP.
    pub fn with_transport(config: PipelineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::build(config, Some(transport))
    }

    /// Load the `[pipeline]` section of an INI file and build a client.
    ///
    /// # Errors
    ///
    /// Propagates any [`ConfigError`] from reading or validating the file.
    pub fn from_ini_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        PipelineConfig::from_ini_file(path).map(Self::new)
    }

    fn build(config: PipelineConfig, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            current_user: RwLock::new(None),
            pipeline: RwLock::new(None),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            transport,
        }
    }

    /// Start the worker pool. Returns `true` if the client is ready.
    ///
    /// Calling this again while initialized is a no-op. A disabled client
    /// initializes without spawning anything.
    pub fn initialize(&self) -> bool {
        let _lifecycle = self.lifecycle.lock();
        if self.initialized.load(Ordering::SeqCst) {
            debug!("femtotrack: client already initialized");
            return true;
        }
        if !self.config.enabled {
            info!("femtotrack: tracking disabled; skipping pipeline start");
            self.initialized.store(true, Ordering::SeqCst);
            return true;
        }

        let dispatcher = Arc::new(match &self.transport {
            Some(transport) => Dispatcher::with_transport(&self.config, Arc::clone(transport)),
            None => Dispatcher::new(&self.config),
        });
        match EventQueue::start(&self.config, dispatcher) {
            Ok(queue) => {
                *self.pipeline.write() = Some(Arc::new(queue));
                self.initialized.store(true, Ordering::SeqCst);
                info!(
                    "femtotrack: client initialized for website {} at {}",
                    self.config.website_id, self.config.endpoint
                );
                true
            }
            Err(err) => {
                error!("femtotrack: failed to start pipeline: {err}");
                false
            }
        }
    }

    /// Queue for tracking calls.
    ///
    /// After `shutdown` the stopped queue is still returned so the refused
    /// event shows up in its drop counters.
    fn tracking_queue(&self, what: &str) -> Option<Arc<EventQueue>> {
        if !self.config.enabled {
            debug!("femtotrack: {what} ignored; tracking disabled");
            return None;
        }
        let queue = self.pipeline.read().clone();
        if queue.is_none() {
            warn!("femtotrack: {what} ignored; client not initialized");
        }
        queue
    }

    fn current_id(&self) -> String {
        match self.current_user.read().as_deref() {
            Some(user) => user.to_owned(),
            None => self.session_id.clone(),
        }
    }

    /// Track custom event `name`.
    pub fn track(
        &self,
        name: &str,
        url: &str,
        title: &str,
        data: Option<BTreeMap<String, Value>>,
    ) -> bool {
        let Some(queue) = self.tracking_queue("track") else {
            return false;
        };
        let mut builder = Payload::builder(&self.config.website_id, name)
            .url(url)
            .title(title)
            .id(self.current_id());
        if let Some(data) = data {
            builder = builder.data(data);
        }
        submit(&queue, builder.build())
    }

    /// Track `name` at `/`, titled after itself.
    pub fn track_name(&self, name: &str) -> bool {
        self.track(name, "/", name, None)
    }

    /// Track a page view; the payload carries no event name.
    pub fn track_page_view(&self, url: &str, title: &str) -> bool {
        let Some(queue) = self.tracking_queue("page view") else {
            return false;
        };
        let built = Payload::pageview(&self.config.website_id)
            .url(url)
            .title(title)
            .id(self.current_id())
            .build();
        submit(&queue, built)
    }

    /// Track a caller-built payload as is.
    pub fn track_payload(&self, builder: PayloadBuilder) -> bool {
        let Some(queue) = self.tracking_queue("track") else {
            return false;
        };
        submit(&queue, builder.build())
    }

    /// Attribute subsequent events to `user_id` and announce it.
    ///
    /// The session-cache token is cleared before the switch so no request for
    /// the new identity reuses the previous one's cache.
    pub fn identify(&self, user_id: &str, attributes: Option<BTreeMap<String, Value>>) -> bool {
        if !self.initialized.load(Ordering::SeqCst) {
            warn!("femtotrack: identify ignored; client not initialized");
            return false;
        }
        let Some(queue) = self.tracking_queue("identify") else {
            return false;
        };
        if user_id.trim().is_empty() {
            warn!("femtotrack: identify requires a non-empty user id");
            return false;
        }

        queue.dispatcher().clear_cache();
        *self.current_user.write() = Some(Arc::from(user_id));
        debug!("femtotrack: identified user {user_id}");

        let mut builder = Payload::builder(&self.config.website_id, IDENTIFY_NAME)
            .id(user_id)
            .url(IDENTIFY_URL)
            .title(IDENTIFY_TITLE);
        if let Some(attributes) = attributes {
            builder = builder.data(attributes);
        }
        match builder.build() {
            Ok(payload) => queue.enqueue(Event::identify(payload)),
            Err(err) => {
                warn!("femtotrack: identify event discarded: {err}");
                false
            }
        }
    }

    /// Forget the identified user; events fall back to the session id.
    pub fn clear_identity(&self) {
        if let Some(queue) = self.pipeline.read().as_ref() {
            queue.dispatcher().clear_cache();
        }
        if self.current_user.write().take().is_some() {
            debug!("femtotrack: identity cleared");
        }
    }

    /// Block until queued events are settled or `timeout` elapses.
    pub fn flush(&self, timeout: Duration) -> bool {
        let Some(queue) = self.pipeline.read().clone() else {
            return true;
        };
        debug!("femtotrack: flushing {} pending event(s)", queue.stats().pending());
        let flushed = queue.flush(timeout);
        if !flushed {
            warn!(
                "femtotrack: flush timed out with {} event(s) pending",
                queue.stats().pending()
            );
        }
        flushed
    }

    /// Stop the pipeline, draining for at most the configured timeout.
    ///
    /// Returns `false` if accepted events had to be abandoned. Statistics
    /// stay readable afterwards; [`initialize`](Self::initialize) starts a
    /// fresh pipeline.
    pub fn shutdown(&self) -> bool {
        let queue = {
            let _lifecycle = self.lifecycle.lock();
            if !self.initialized.swap(false, Ordering::SeqCst) {
                return true;
            }
            self.pipeline.read().clone()
        };
        let Some(queue) = queue else {
            return true;
        };
        info!("femtotrack: shutting down client");
        queue.shutdown(self.config.shutdown_timeout)
    }

    /// Alias of [`shutdown`](Self::shutdown).
    pub fn close(&self) -> bool {
        self.shutdown()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Per-client id used while no user is identified.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.current_user.read().as_deref().map(str::to_owned)
    }

    /// Counters of the most recent pipeline; zero before the first start.
    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline
            .read()
            .as_ref()
            .map(|queue| queue.snapshot())
            .unwrap_or_default()
    }

    pub fn queue_depth(&self) -> usize {
        self.pipeline
            .read()
            .as_ref()
            .map_or(0, |queue| queue.queue_depth())
    }

    pub fn queued_count(&self) -> u64 {
        self.stats().queued
    }

    pub fn processed_count(&self) -> u64 {
        self.stats().processed
    }

    pub fn dropped_count(&self) -> u64 {
        self.stats().dropped
    }
}

fn submit(queue: &EventQueue, built: Result<Payload, PayloadError>) -> bool {
    match built {
        Ok(payload) => queue.enqueue(Event::new(payload)),
        Err(err) => {
            warn!("femtotrack: invalid event discarded: {err}");
            false
        }
    }
}

impl Drop for TrackerClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TrackerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerClient")
            .field("endpoint", &self.config.endpoint)
            .field("website_id", &self.config.website_id)
            .field("session_id", &self.session_id)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
