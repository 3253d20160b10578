use crate::sink::ResponseSink;
use bytes::Bytes;
use http::Request;
use std::fmt;
use std::sync::Arc;

/// A request handler writing its response into a [`ResponseSink`].
///
/// Middleware in this crate are handlers themselves: each one wraps an inner
/// handler, decorates the sink or the request, and calls through.
pub trait Handler {
    /// Handles one request.
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>);
}

impl<H: Handler + ?Sized> Handler for &H {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        (**self).serve(sink, req)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        (**self).serve(sink, req)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        (**self).serve(sink, req)
    }
}

/// Creates a [`Handler`] from a closure.
///
/// ```
/// use http_response_middleware::{ResponseSink, handler_fn};
///
/// let hello = handler_fn(|sink, _req| {
///     if let Err(e) = sink.write_all(b"hello") {
///         tracing::debug!("failed to write response: {}", e);
///     }
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut dyn ResponseSink, &mut Request<Bytes>),
{
    HandlerFn { f }
}

/// A [`Handler`] backed by a closure, see [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut dyn ResponseSink, &mut Request<Bytes>),
{
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        (self.f)(sink, req)
    }
}
