//! Event representation for the delivery pipeline.
//!
//! An [`Event`] wraps an immutable [`Payload`] together with the metadata the
//! pipeline needs while it owns the event: the wire `type`, the creation
//! timestamp, and how many delivery attempts have failed so far.

mod payload;

#[cfg(test)]
mod tests;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use payload::{DEFAULT_LANGUAGE, DEFAULT_SCREEN, Payload, PayloadBuilder, PayloadError};

/// Wire `type` of an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Regular tracked occurrence (pageview or custom event).
    #[default]
    Event,
    /// Identity announcement sent when the caller logs a user in.
    Identify,
}

impl EventKind {
    /// Return the string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Identify => "identify",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of delivery work.
///
/// Only `retry_count` changes after construction; the dispatcher bumps it on
/// every failed attempt.
#[derive(Clone, Debug)]
pub struct Event {
    payload: Payload,
    kind: EventKind,
    created_at: DateTime<Utc>,
    retry_count: u32,
}

impl Event {
    /// Wrap `payload` as a regular `event`.
    pub fn new(payload: Payload) -> Self {
        Self::with_kind(payload, EventKind::Event)
    }

    /// Wrap `payload` as an `identify` event.
    pub fn identify(payload: Payload) -> Self {
        Self::with_kind(payload, EventKind::Identify)
    }

    /// Wrap `payload` using an explicit `kind`.
    pub fn with_kind(payload: Payload, kind: EventKind) -> Self {
        Self {
            payload,
            kind,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of failed delivery attempts recorded so far.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn increment_retry_count(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }

    /// Short label used in diagnostics: the event name, or `pageview`.
    pub fn label(&self) -> &str {
        self.payload.name().unwrap_or("pageview")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' (website={}, id={}, retries={})",
            self.kind,
            self.label(),
            self.payload.website(),
            self.payload.id(),
            self.retry_count
        )
    }
}
