//! Network delivery of single events.
//!
//! A [`Dispatcher`] posts one serialised event to the collector, retrying
//! failed attempts with capped exponential backoff. Successful responses may
//! carry a session-cache token which is echoed back on later requests until
//! [`Dispatcher::clear_cache`] is called.

mod backoff;
mod cache;
mod transport;


use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::event::Event;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::serialise::serialise_event;
use crate::user_agent::user_agent;

pub use backoff::BackoffPolicy;
pub use cache::SessionCache;
pub use transport::{HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};

/// Request header carrying the session-cache token.
pub const CACHE_HEADER: &str = "x-umami-cache";

/// Why a single attempt failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("collector rejected event with status {status}")]
    Rejected { status: u16 },
    #[error("attempt cancelled")]
    Cancelled,
}

/// Why an event could not be delivered.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to serialise event: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("delivery cancelled")]
    Cancelled,
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: AttemptError },
}

/// Fields the collector may return on success.
#[derive(Debug, Default, Deserialize)]
struct CollectorResponse {
    #[serde(default)]
    cache: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
    #[serde(default, rename = "visitId")]
    visit_id: Option<String>,
}

/// Sends events to the collector with retries.
pub struct Dispatcher {
    url: String,
    policy: BackoffPolicy,
    max_retries: u32,
    timeout: Duration,
    sentinel: Option<String>,
    cache: SessionCache,
    transport: Arc<dyn Transport>,
    cancel: CancelToken,
    warner: RateLimitedWarner,
}

impl Dispatcher {
    /// Build a dispatcher that talks HTTP through `ureq`.
    pub fn new(config: &PipelineConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(config.request_timeout));
        Self::with_transport(config, transport)
    }

    /// Build a dispatcher over a caller-supplied transport.
    pub fn with_transport(config: &PipelineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: config.send_url(),
            policy: config.backoff_policy(),
            max_retries: config.max_retries,
            timeout: config.request_timeout,
            sentinel: config.cache_sentinel.clone(),
            cache: SessionCache::new(),
            transport,
            cancel: CancelToken::new(),
            warner: RateLimitedWarner::new(config.warn_interval),
        }
    }

    /// Deliver `event`, returning whether the collector accepted it.
    pub fn send(&self, event: &mut Event) -> bool {
        match self.deliver(event) {
            Ok(attempts) => {
                debug!("femtotrack: delivered {event} in {attempts} attempt(s)");
                true
            }
            Err(DispatchError::Cancelled) => {
                debug!("femtotrack: delivery of {event} cancelled");
                false
            }
            Err(err) => {
                self.report_failure(event, &err);
                false
            }
        }
    }

    /// Deliver `event`, returning the number of attempts used on success.
    ///
    /// Each failed attempt increments the event's retry count. Cancellation
    /// during a backoff sleep aborts at once without counting another failure.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Exhausted`] once `max_retries + 1` attempts failed,
    /// [`DispatchError::Cancelled`] if the cancel token fired, and
    /// [`DispatchError::Serialise`] if the event could not be encoded.
    pub fn deliver(&self, event: &mut Event) -> Result<u32, DispatchError> {
        let body = serialise_event(event)?;
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                self.cancel
                    .sleep(self.policy.delay(attempt))
                    .map_err(|_| DispatchError::Cancelled)?;
            }
            let err = match self.attempt(&body) {
                Ok(()) => return Ok(attempt + 1),
                Err(AttemptError::Cancelled) => return Err(DispatchError::Cancelled),
                Err(err) => err,
            };
            event.increment_retry_count();
            if attempt >= self.max_retries {
                return Err(DispatchError::Exhausted {
                    attempts: attempt + 1,
                    last: err,
                });
            }
            warn!(
                "femtotrack: attempt {} for {} '{}' failed: {err}",
                attempt + 1,
                event.kind(),
                event.label()
            );
            attempt += 1;
        }
    }

    fn attempt(&self, body: &str) -> Result<(), AttemptError> {
        if self.cancel.is_cancelled() {
            return Err(AttemptError::Cancelled);
        }
        let snapshot = self.cache.snapshot();
        let mut headers = vec![
            ("Content-Type", "application/json"),
            ("User-Agent", user_agent()),
        ];
        if let Some(token) = snapshot.token.as_deref() {
            headers.push((CACHE_HEADER, token));
        }
        let response = self.transport.post(&HttpRequest {
            url: &self.url,
            headers: &headers,
            body,
            timeout: self.timeout,
        })?;
        if !response.is_success() {
            return Err(AttemptError::Rejected {
                status: response.status,
            });
        }
        self.absorb_response(&response.body, snapshot.generation);
        Ok(())
    }

    fn absorb_response(&self, body: &str, generation: u64) {
        if body.trim().is_empty() {
            return;
        }
        let parsed: CollectorResponse = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("femtotrack: ignoring unparseable collector response: {err}");
                return;
            }
        };
        debug!(
            "femtotrack: collector session={:?} visit={:?}",
            parsed.session_id, parsed.visit_id
        );
        let Some(token) = parsed.cache.filter(|token| self.is_storable(token)) else {
            return;
        };
        if !self.cache.store(&token, generation) {
            debug!("femtotrack: discarded cache token from a response older than clear_cache");
        }
    }

    fn is_storable(&self, token: &str) -> bool {
        !token.is_empty() && self.sentinel.as_deref() != Some(token)
    }

    // Every drop is logged with its context; the error-level summary is
    // rate limited.
    fn report_failure(&self, event: &Event, err: &DispatchError) {
        warn!("femtotrack: dropping {event}: {err}");
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            error!(
                "femtotrack: dropped {count} event(s) that could not be delivered; \
                 latest {} id={}: {err}",
                event.kind(),
                event.payload().id()
            );
        });
    }

    /// Forget the session-cache token.
    ///
    /// No attempt that starts after this returns carries the old token, and
    /// responses to attempts already in flight are not allowed to restore it.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Token currently echoed in [`CACHE_HEADER`], if any.
    pub fn cache_token(&self) -> Option<Arc<str>> {
        self.cache.get()
    }

    /// Token that aborts backoff sleeps and pending attempts.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// URL events are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("url", &self.url)
            .field("policy", &self.policy)
            .field("max_retries", &self.max_retries)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
