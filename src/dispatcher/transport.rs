//! HTTP transport used by the dispatcher.
//!
//! [`Transport`] is the seam between retry logic and the network. The
//! production implementation wraps a pooled `ureq::Agent`; tests substitute
//! scripted fakes.

use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use ureq::{Agent, AgentBuilder};

/// Upper bound on response bytes read back from the collector.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

/// One outgoing POST request.
#[derive(Debug)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a str,
    pub timeout: Duration,
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure; no HTTP status was received.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// Performs a single HTTP POST.
///
/// Implementations must return `Ok` for every response that carried a status
/// line, including 4xx and 5xx, and reserve `Err` for failures below HTTP.
pub trait Transport: Send + Sync {
    fn post(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `ureq::Agent`.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build an agent whose connect and overall timeouts equal `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .redirects(5)
            .build();
        Self { agent }
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn post(&self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        let mut req = self.agent.post(request.url).timeout(request.timeout);
        for (name, value) in request.headers {
            req = req.set(name, value);
        }
        match req.send_string(request.body) {
            Ok(response) => Ok(read_response(response)),
            Err(ureq::Error::Status(_, response)) => Ok(read_response(response)),
            Err(ureq::Error::Transport(err)) => Err(classify_transport(&err)),
        }
    }
}

fn read_response(response: ureq::Response) -> HttpResponse {
    let status = response.status();
    let mut body = String::new();
    if let Err(err) = response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_string(&mut body)
    {
        log::debug!("femtotrack: failed to read collector response body: {err}");
        body.clear();
    }
    HttpResponse { status, body }
}

fn classify_transport(err: &ureq::Transport) -> TransportError {
    let is_timeout = std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<std::io::Error>())
        .is_some_and(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        });
    if is_timeout {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(301, false)]
    #[case(404, false)]
    #[case(503, false)]
    fn success_range_is_2xx(#[case] status: u16, #[case] expected: bool) {
        let response = HttpResponse {
            status,
            body: String::new(),
        };
        assert_eq!(response.is_success(), expected);
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let transport = UreqTransport::new(Duration::from_millis(500));
        let url = format!("http://{addr}/api/send");
        let result = transport.post(&HttpRequest {
            url: &url,
            headers: &[],
            body: "{}",
            timeout: Duration::from_millis(500),
        });
        assert!(result.is_err());
    }
}
