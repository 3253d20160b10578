use crate::error::write_error;
use crate::handler::Handler;
use crate::intercept::InterceptingSink;
use crate::sink::ResponseSink;
use bytes::Bytes;
use http::{Request, StatusCode};
use serde::Deserialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tower::Layer;
use tracing::{error, warn};

/// Settings for [`PanicGuard`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Let a handler panic continue unwinding past the guard instead of
    /// answering `500 Internal Server Error`.
    pub allow_panics: bool,
}

/// A panic caught at the guard boundary.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct Fault {
    message: String,
    payload: Box<dyn Any + Send>,
}

impl Fault {
    fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };
        Self { message, payload }
    }

    /// Returns the panic message, when the payload was a string.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the fault, returning the original panic payload.
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }

    /// Continues unwinding with the original payload.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

/// How a guarded request ended.
#[derive(Debug)]
pub enum Outcome {
    /// The handler returned normally.
    Completed,
    /// The handler panicked and the guard contained it.
    ///
    /// `responded` tells whether the guard wrote the generic error response;
    /// it does not when the handler had already committed a status.
    Recovered {
        /// Whether the guard wrote the error response.
        responded: bool,
    },
    /// The handler panicked and the guard is configured to let it through.
    Propagated(Fault),
}

/// A Tower layer that contains handler panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicGuardLayer {
    config: GuardConfig,
}

impl PanicGuardLayer {
    /// Creates a guard layer that answers panics with a `500`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a guard layer from configuration.
    pub fn with_config(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Sets whether panics propagate past the guard.
    pub fn allow_panics(mut self, allow: bool) -> Self {
        self.config.allow_panics = allow;
        self
    }
}

impl<H> Layer<H> for PanicGuardLayer {
    type Service = PanicGuard<H>;

    fn layer(&self, inner: H) -> Self::Service {
        PanicGuard::new(inner, self.config)
    }
}

/// A handler that bounds a panic in the wrapped handler to one request.
///
/// Place it outermost so it sees panics raised by every other layer. Inner
/// layers holding resources release them while unwinding, before the guard
/// takes over; an open compressed stream, for instance, is finalized then.
#[derive(Debug, Clone)]
pub struct PanicGuard<H> {
    inner: H,
    config: GuardConfig,
}

impl<H> PanicGuard<H> {
    /// Creates a new guard around the given handler.
    pub fn new(inner: H, config: GuardConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the guard configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Consumes this guard, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> PanicGuard<H> {
    /// Runs the inner handler and reports how it ended, without resuming a
    /// propagated panic.
    pub fn run(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) -> Outcome {
        let mut guarded = InterceptingSink::new(sink);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.serve(&mut guarded, req);
        }));

        let Err(payload) = result else {
            return Outcome::Completed;
        };
        let fault = Fault::new(payload);

        if self.config.allow_panics {
            return Outcome::Propagated(fault);
        }

        error!(
            method = %req.method(),
            uri = %req.uri(),
            "recovered from handler panic: {}",
            fault.message()
        );

        if guarded.committed() {
            warn!(
                status = guarded.wire_status().as_u16(),
                "response already committed; not writing error response"
            );
            return Outcome::Recovered { responded: false };
        }

        if let Err(e) = write_error(&mut guarded, StatusCode::INTERNAL_SERVER_ERROR, "") {
            error!("failed to write error response: {}", e);
        }
        Outcome::Recovered { responded: true }
    }
}

impl<H: Handler> Handler for PanicGuard<H> {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        if let Outcome::Propagated(fault) = self.run(sink, req) {
            fault.resume();
        }
    }
}
