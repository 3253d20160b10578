use crate::future::ResponseFuture;
use crate::handler::Handler;
use bytes::Bytes;
use http::Request;
use http_body::Body;
use http_body_util::{BodyExt, Full};
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that runs a [`Handler`] pipeline.
///
/// The request body is collected before the handler runs; the response is
/// recorded in memory and returned as a single [`Full`] body. Panics that the
/// pipeline lets through surface from polling the returned future.
pub struct HandlerService<H> {
    handler: Arc<H>,
}

impl<H> HandlerService<H> {
    /// Creates a new service running the given handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Returns a reference to the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H> Clone for HandlerService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: fmt::Debug> fmt::Debug for HandlerService<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerService")
            .field("handler", &self.handler)
            .finish()
    }
}

impl<H, ReqBody> Service<Request<ReqBody>> for HandlerService<H>
where
    H: Handler,
    ReqBody: Body,
{
    type Response = http::Response<Full<Bytes>>;
    type Error = ReqBody::Error;
    type Future = ResponseFuture<H, ReqBody>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let (parts, body) = req.into_parts();
        ResponseFuture::new(body.collect(), parts, Arc::clone(&self.handler))
    }
}
