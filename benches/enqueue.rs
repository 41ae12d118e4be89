//! Benchmarks for the caller-side hot path: payload construction,
//! serialisation and non-blocking enqueue.

use std::sync::Arc;
use std::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use femtotrack::{
    Dispatcher, Event, EventQueue, HttpRequest, HttpResponse, Payload, PipelineConfig, Transport,
    TransportError, serialise_event,
};

/// Accepts every request instantly.
struct NullTransport;

impl Transport for NullTransport {
    fn post(&self, _request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: String::new(),
        })
    }
}

fn sample_event() -> Event {
    let payload = Payload::builder("bench-site", "button-click")
        .id("bench-session")
        .url("/checkout")
        .title("Checkout")
        .add_data("category", "commerce")
        .add_data("value", 42)
        .build()
        .expect("valid payload");
    Event::new(payload)
}

fn bench_serialise(c: &mut Criterion) {
    let event = sample_event();
    c.bench_function("serialise_event", |b| {
        b.iter(|| serialise_event(black_box(&event)).expect("serialise"));
    });
}

fn bench_enqueue(c: &mut Criterion) {
    let config = PipelineConfig::builder("http://collector.bench", "bench-site")
        .with_max_queue_depth(100_000)
        .with_worker_count(2)
        .build()
        .expect("config");
    let dispatcher = Arc::new(Dispatcher::with_transport(&config, Arc::new(NullTransport)));
    let queue = EventQueue::start(&config, dispatcher).expect("start queue");

    c.bench_function("enqueue", |b| {
        b.iter_batched(
            sample_event,
            |event| black_box(queue.enqueue(event)),
            BatchSize::SmallInput,
        );
    });

    queue.shutdown(Duration::from_secs(10));
}

criterion_group!(benches, bench_serialise, bench_enqueue);
criterion_main!(benches);
