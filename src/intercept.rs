use crate::sink::ResponseSink;
use http::{HeaderMap, StatusCode};
use std::io;

/// A [`ResponseSink`] decorator that observes the status a handler sends.
///
/// Every call is forwarded unchanged to the wrapped sink. The first status
/// written is the one captured; later calls are still forwarded so the inner
/// sink applies its own rules to them.
///
/// Informational (`1xx`) statuses are captured like any other, but only a
/// final status or a body write commits the response.
#[derive(Debug)]
pub struct InterceptingSink<S> {
    inner: S,
    status: Option<StatusCode>,
    final_status: Option<StatusCode>,
}

impl<S> InterceptingSink<S> {
    /// Wraps the given sink.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            status: None,
            final_status: None,
        }
    }

    /// Returns the captured status.
    ///
    /// `None` means the handler neither wrote a status nor any body bytes,
    /// which lets observers tell an untouched response apart from an explicit
    /// `200 OK`.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the final status the client receives: the first
    /// non-informational one, or the protocol default of `200 OK`.
    pub fn wire_status(&self) -> StatusCode {
        self.final_status.unwrap_or(StatusCode::OK)
    }

    /// Returns whether the final status has been committed.
    pub fn committed(&self) -> bool {
        self.final_status.is_some()
    }

    /// Returns a reference to the wrapped sink.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the wrapped sink.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this sink, returning the wrapped one.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResponseSink> ResponseSink for InterceptingSink<S> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        if self.final_status.is_none() && !status.is_informational() {
            self.final_status = Some(status);
        }
        self.inner.write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The inner sink commits its own default; only record it here.
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        if self.final_status.is_none() {
            self.final_status = Some(StatusCode::OK);
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::Recorder;

    #[test]
    fn test_untouched() {
        let sink = InterceptingSink::new(Recorder::new());
        assert_eq!(sink.status(), None);
        assert!(!sink.committed());
        assert_eq!(sink.wire_status(), StatusCode::OK);
    }

    #[test]
    fn test_write_without_status_defaults_to_ok() {
        let mut sink = InterceptingSink::new(Recorder::new());
        sink.write_all(b"elided").unwrap();

        assert_eq!(sink.status(), Some(StatusCode::OK));
        assert!(sink.committed());

        let recorder = sink.into_inner();
        assert_eq!(recorder.status(), Some(StatusCode::OK));
        assert_eq!(recorder.body(), b"elided");
    }

    #[test]
    fn test_explicit_status_without_body() {
        let mut sink = InterceptingSink::new(Recorder::new());
        sink.write_status(StatusCode::CREATED);

        assert_eq!(sink.status(), Some(StatusCode::CREATED));
        let response = sink.into_inner().into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_first_status_is_captured() {
        let mut sink = InterceptingSink::new(Recorder::new());
        sink.write_status(StatusCode::ACCEPTED);
        sink.write_status(StatusCode::BAD_REQUEST);
        sink.write_all(b"body").unwrap();

        assert_eq!(sink.status(), Some(StatusCode::ACCEPTED));
    }

    #[test]
    fn test_informational_status_does_not_commit() {
        let mut sink = InterceptingSink::new(Recorder::new());
        sink.write_status(StatusCode::CONTINUE);

        assert_eq!(sink.status(), Some(StatusCode::CONTINUE));
        assert!(!sink.committed());

        sink.write_all(b"body").unwrap();
        assert!(sink.committed());
        assert_eq!(sink.wire_status(), StatusCode::OK);
        assert_eq!(sink.into_inner().into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_headers_forwarded() {
        let mut sink = InterceptingSink::new(Recorder::new());
        sink.headers_mut()
            .insert(http::header::CONTENT_TYPE, "text/plain".parse().unwrap());

        assert_eq!(
            sink.get_ref().headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }
}
