//! Per-status-class request counters.
//!
//! ```
//! use http_response_middleware::counter::{Counter, StatusCounterLayer};
//! use http_response_middleware::handler_fn;
//! use tower::ServiceBuilder;
//!
//! let server_errors = Counter::default();
//! let handler = ServiceBuilder::new()
//!     .layer(StatusCounterLayer::server_error(server_errors.clone()))
//!     .service(handler_fn(|_sink, _req| {}));
//! ```

use crate::handler::Handler;
use crate::intercept::InterceptingSink;
use crate::sink::ResponseSink;
use bytes::Bytes;
use http::{Request, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tower::Layer;

/// A shared request counter.
pub type Counter = Arc<AtomicU64>;

/// Which responses a [`StatusCounter`] counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Every response.
    All,
    /// `1xx` responses.
    Informational,
    /// `2xx` responses, and responses whose handler never touched the sink.
    Success,
    /// `3xx` responses.
    Redirection,
    /// `4xx` responses.
    ClientError,
    /// `5xx` responses.
    ServerError,
}

impl StatusClass {
    /// Whether a response with the captured `status` belongs to this class.
    ///
    /// An untouched response (`None`) goes out as `200 OK`, so it is counted
    /// as a success.
    pub fn matches(&self, status: Option<StatusCode>) -> bool {
        let Some(status) = status else {
            return matches!(self, StatusClass::All | StatusClass::Success);
        };
        match self {
            StatusClass::All => true,
            StatusClass::Informational => status.is_informational(),
            StatusClass::Success => status.is_success(),
            StatusClass::Redirection => status.is_redirection(),
            StatusClass::ClientError => status.is_client_error(),
            StatusClass::ServerError => status.is_server_error(),
        }
    }
}

/// A Tower layer that counts responses of one status class.
#[derive(Debug, Clone)]
pub struct StatusCounterLayer {
    counter: Counter,
    class: StatusClass,
}

impl StatusCounterLayer {
    /// Counts responses of `class` into `counter`.
    pub fn new(counter: Counter, class: StatusClass) -> Self {
        Self { counter, class }
    }

    /// Counts every response.
    pub fn all(counter: Counter) -> Self {
        Self::new(counter, StatusClass::All)
    }

    /// Counts `1xx` responses.
    pub fn informational(counter: Counter) -> Self {
        Self::new(counter, StatusClass::Informational)
    }

    /// Counts `2xx` responses.
    pub fn success(counter: Counter) -> Self {
        Self::new(counter, StatusClass::Success)
    }

    /// Counts `3xx` responses.
    pub fn redirection(counter: Counter) -> Self {
        Self::new(counter, StatusClass::Redirection)
    }

    /// Counts `4xx` responses.
    pub fn client_error(counter: Counter) -> Self {
        Self::new(counter, StatusClass::ClientError)
    }

    /// Counts `5xx` responses.
    pub fn server_error(counter: Counter) -> Self {
        Self::new(counter, StatusClass::ServerError)
    }
}

impl<H> Layer<H> for StatusCounterLayer {
    type Service = StatusCounter<H>;

    fn layer(&self, inner: H) -> Self::Service {
        StatusCounter {
            inner,
            counter: self.counter.clone(),
            class: self.class,
        }
    }
}

/// A handler that counts the responses of the handler it wraps.
///
/// Counting happens when the inner handler returns; a request that panics
/// is not counted.
#[derive(Debug, Clone)]
pub struct StatusCounter<H> {
    inner: H,
    counter: Counter,
    class: StatusClass,
}

impl<H> StatusCounter<H> {
    /// Returns the counter being incremented.
    pub fn counter(&self) -> &Counter {
        &self.counter
    }
}

impl<H: Handler> Handler for StatusCounter<H> {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        let mut intercepting = InterceptingSink::new(sink);
        self.inner.serve(&mut intercepting, req);
        if self.class.matches(intercepting.status()) {
            self.counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
