//! Diagnostics emitted through the `log` facade.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use femtotrack::{
    Dispatcher, EventQueue, HttpRequest, HttpResponse, Payload, PipelineConfig, Transport,
    TransportError,
};
use logtest::Logger;
use serial_test::serial;

struct SlowTransport;

impl Transport for SlowTransport {
    fn post(&self, _request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        thread::sleep(Duration::from_millis(200));
        Ok(HttpResponse {
            status: 200,
            body: String::new(),
        })
    }
}

#[test]
#[serial]
fn overflow_and_shutdown_are_logged() {
    let mut logger = Logger::start();
    let config = PipelineConfig::builder("http://collector.test", "site-log")
        .with_max_queue_depth(1)
        .with_poll_interval_ms(10)
        .build()
        .expect("config");
    let dispatcher = Arc::new(Dispatcher::with_transport(&config, Arc::new(SlowTransport)));
    let queue = EventQueue::start(&config, dispatcher).expect("start queue");

    let accepted = (0..3)
        .map(|i| {
            let payload = Payload::builder("site-log", format!("e{i}"))
                .build()
                .expect("payload");
            queue.enqueue(femtotrack::Event::new(payload))
        })
        .filter(|accepted| *accepted)
        .count();
    assert!(accepted < 3);
    assert!(queue.shutdown(Duration::from_secs(5)));

    let records: Vec<_> = std::iter::from_fn(|| logger.pop()).collect();
    assert!(records.iter().any(|record| {
        record.level() == log::Level::Warn
            && record.args().contains("at enqueue: queue full")
    }));
    assert!(records.iter().any(|record| {
        record.level() == log::Level::Info && record.args().contains("pipeline stopped")
    }));
}
