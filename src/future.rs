use crate::handler::Handler;
use crate::recorder::Recorder;
use bytes::Bytes;
use http::{Request, request};
use http_body::Body;
use http_body_util::Full;
use http_body_util::combinators::Collect;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future for [`HandlerService`](crate::HandlerService) responses.
    pub struct ResponseFuture<H, B>
    where
        B: Body,
    {
        #[pin]
        collect: Collect<B>,
        parts: Option<request::Parts>,
        handler: Arc<H>,
    }
}

impl<H, B: Body> ResponseFuture<H, B> {
    pub(crate) fn new(collect: Collect<B>, parts: request::Parts, handler: Arc<H>) -> Self {
        Self {
            collect,
            parts: Some(parts),
            handler,
        }
    }
}

impl<H, B> Future for ResponseFuture<H, B>
where
    H: Handler,
    B: Body,
{
    type Output = Result<http::Response<Full<Bytes>>, B::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        let body = ready!(this.collect.poll(cx))?.to_bytes();
        let parts = this
            .parts
            .take()
            .expect("ResponseFuture polled after completion");

        let mut req = Request::from_parts(parts, body);
        let mut recorder = Recorder::new();
        this.handler.serve(&mut recorder, &mut req);

        Poll::Ready(Ok(recorder.into_response().map(Full::new)))
    }
}
