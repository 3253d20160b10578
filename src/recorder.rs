use crate::sink::ResponseSink;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use std::io;

/// An in-memory [`ResponseSink`] that records everything written to it.
///
/// Headers are snapshotted when the final status is committed, so
/// modifications made afterwards are not visible in the recorded response,
/// just as they would not reach the wire. Informational (`1xx`) statuses are
/// kept aside and do not commit anything.
#[derive(Debug, Default)]
pub struct Recorder {
    status: Option<StatusCode>,
    interim: Vec<StatusCode>,
    headers: HeaderMap,
    committed_headers: Option<HeaderMap>,
    body: BytesMut,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the informational statuses sent ahead of the final one.
    pub fn informational(&self) -> &[StatusCode] {
        &self.interim
    }

    /// Returns the recorded body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the headers as they were when the status was committed, or the
    /// current headers if nothing was committed yet.
    pub fn sent_headers(&self) -> &HeaderMap {
        self.committed_headers.as_ref().unwrap_or(&self.headers)
    }

    /// Converts the recording into a response.
    ///
    /// A recorder that was never written to yields an empty `200 OK`.
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.committed_headers.unwrap_or(self.headers);
        response
    }
}

impl ResponseSink for Recorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_some() {
            return;
        }
        if status.is_informational() {
            self.interim.push(status);
            return;
        }
        self.status = Some(status);
        self.committed_headers = Some(self.headers.clone());
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_status(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;

    #[test]
    fn test_write_defaults_status() {
        let mut recorder = Recorder::new();
        recorder.write_all(b"hello").unwrap();

        assert_eq!(recorder.status(), Some(StatusCode::OK));
        assert_eq!(recorder.body(), b"hello");
    }

    #[test]
    fn test_first_status_wins() {
        let mut recorder = Recorder::new();
        recorder.write_status(StatusCode::CREATED);
        recorder.write_status(StatusCode::NOT_FOUND);

        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_headers_frozen_on_commit() {
        let mut recorder = Recorder::new();
        recorder
            .headers_mut()
            .insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        recorder.write_all(b"body").unwrap();
        recorder
            .headers_mut()
            .insert(header::CONTENT_LENGTH, "4".parse().unwrap());

        let response = recorder.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_informational_does_not_commit() {
        let mut recorder = Recorder::new();
        recorder.write_status(StatusCode::CONTINUE);
        recorder
            .headers_mut()
            .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        recorder.write_all(b"after").unwrap();

        assert_eq!(recorder.informational(), [StatusCode::CONTINUE]);
        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_untouched_recorder() {
        let recorder = Recorder::new();
        assert_eq!(recorder.status(), None);

        let response = recorder.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
    }
}
