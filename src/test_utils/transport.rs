//! Scripted [`Transport`] double.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::dispatcher::{HttpRequest, HttpResponse, Transport, TransportError};

/// Request as observed by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: String,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Replays queued outcomes in order, then answers `200` with an empty body.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) -> &Self {
        self.script.lock().push_back(Ok(HttpResponse {
            status,
            body: body.to_owned(),
        }));
        self
    }

    pub(crate) fn fail(&self, err: TransportError) -> &Self {
        self.script.lock().push_back(Err(err));
        self
    }

    /// Answer `status` for every request `times` times.
    pub(crate) fn respond_times(&self, status: u16, times: usize) -> &Self {
        for _ in 0..times {
            self.respond(status, "");
        }
        self
    }

    /// Sleep this long inside every `post`.
    pub(crate) fn with_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock() = Some(latency);
        self
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn post(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(RecordedRequest {
            url: request.url.to_owned(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: request.body.to_owned(),
        });
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            thread::sleep(latency);
        }
        self.script.lock().pop_front().unwrap_or(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }))
    }
}
