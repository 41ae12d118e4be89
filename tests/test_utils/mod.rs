//! Shared helpers for the integration tests.

pub mod collector;

pub use collector::{CapturedRequest, MockCollector};
