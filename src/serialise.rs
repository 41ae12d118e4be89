//! JSON wire encoding for events.
//!
//! The collector expects `{"type": ..., "payload": {...}}`. The envelope
//! borrows from the event so serialising never clones payload strings.

use serde::Serialize;

use crate::event::{Event, EventKind, Payload};

/// Borrowed view of an [`Event`] shaped like the collector's request body.
#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    payload: &'a Payload,
}

impl<'a> From<&'a Event> for WireEvent<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            kind: event.kind(),
            payload: event.payload(),
        }
    }
}

/// Serialise `event` into the request body sent to the collector.
///
/// # Errors
///
/// Returns the underlying [`serde_json::Error`] if encoding fails.
pub fn serialise_event(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WireEvent::from(event))
}
