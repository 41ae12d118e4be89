//! Test-only helpers shared across crate unit tests.

pub(crate) mod transport;

use crate::config::{PipelineConfig, PipelineConfigBuilder};
use crate::event::{Event, Payload};

/// Collector base used by configs that never touch the network.
pub(crate) const TEST_ENDPOINT: &str = "http://collector.test";
pub(crate) const TEST_WEBSITE: &str = "site-test";

/// Builder with millisecond-scale timings so retry tests stay fast.
pub(crate) fn fast_config() -> PipelineConfigBuilder {
    PipelineConfig::builder(TEST_ENDPOINT, TEST_WEBSITE)
        .with_initial_backoff_ms(1)
        .with_max_backoff_ms(4)
        .with_request_timeout_ms(500)
        .with_poll_interval_ms(10)
}

/// Custom event named `name` for the test website.
pub(crate) fn named_event(name: &str) -> Event {
    let payload = Payload::builder(TEST_WEBSITE, name)
        .id("session-test")
        .build()
        .expect("valid payload");
    Event::new(payload)
}
