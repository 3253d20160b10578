use crate::codec::Codec;
use crate::compress::CompressingSink;
use crate::handler::Handler;
use crate::sink::ResponseSink;
use bytes::Bytes;
use http::{Request, header};
use tower::Layer;
use tracing::{error, trace};

/// A Tower layer that compresses response bodies.
///
/// The encoding is negotiated from the request's `Accept-Encoding` header,
/// which is then removed so the wrapped handler never sees it.
#[derive(Debug, Clone, Default)]
pub struct CompressionLayer {
    _priv: (),
}

impl CompressionLayer {
    /// Creates a new compression layer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> Layer<H> for CompressionLayer {
    type Service = Compression<H>;

    fn layer(&self, inner: H) -> Self::Service {
        Compression::new(inner)
    }
}

/// A handler that compresses the responses of the handler it wraps.
#[derive(Debug, Clone)]
pub struct Compression<H> {
    inner: H,
}

impl<H> Compression<H> {
    /// Creates a new compression handler wrapping the given inner handler.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    /// Returns a reference to the inner handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Returns a mutable reference to the inner handler.
    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    /// Consumes this handler, returning the inner handler.
    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: Handler> Handler for Compression<H> {
    fn serve(&self, sink: &mut dyn ResponseSink, req: &mut Request<Bytes>) {
        let codec = negotiate(req);
        trace!(
            encoding = codec.map_or("identity", |c| c.content_encoding()),
            "negotiated response encoding"
        );

        // Dropping the sink finalizes the stream should the handler unwind.
        let mut compressing = CompressingSink::new(sink, codec);
        self.inner.serve(&mut compressing, req);

        if let Err(e) = compressing.finish() {
            error!("failed to finish compressed response: {}", e);
        }
    }
}

/// Picks the response codec and strips `Accept-Encoding` from the request.
fn negotiate(req: &mut Request<Bytes>) -> Option<Codec> {
    let accepted = req
        .headers()
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");
    req.headers_mut().remove(header::ACCEPT_ENCODING);

    Codec::from_accept_encoding(&accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::write_error;
    use crate::handler::handler_fn;
    use crate::recorder::Recorder;
    use crate::sink::BrokenSink;
    use flate2::read::{DeflateDecoder, GzDecoder};
    use http::StatusCode;
    use std::io::Read;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const RESPONSE: &str = "{pi:3.14159265}";

    fn request(accept_encoding: Option<&'static str>) -> Request<Bytes> {
        let mut builder = Request::get("/some/url");
        if let Some(value) = accept_encoding {
            builder = builder.header(header::ACCEPT_ENCODING, value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    /// Writes `RESPONSE`, or a 400 if `Accept-Encoding` leaked through.
    fn strict_handler() -> impl Handler {
        handler_fn(|sink, req| {
            if let Some(leaked) = req.headers().get(header::ACCEPT_ENCODING) {
                let message = format!("ought to have removed `Accept-Encoding`: {:?}", leaked);
                write_error(sink, StatusCode::BAD_REQUEST, &message).unwrap();
                return;
            }
            sink.write_all(RESPONSE.as_bytes()).unwrap();
        })
    }

    fn serve(accept_encoding: Option<&'static str>) -> http::Response<Bytes> {
        let handler = CompressionLayer::new().layer(strict_handler());
        let mut recorder = Recorder::new();
        handler.serve(&mut recorder, &mut request(accept_encoding));
        recorder.into_response()
    }

    #[test]
    fn test_uncompressed_without_accept_encoding() {
        let response = serve(None);

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(&response.body()[..], RESPONSE.as_bytes());
    }

    #[test]
    fn test_uncompressed_with_unsupported_encodings() {
        for accept in ["", "br", "compress, identity", "gzip;q=0"] {
            let response = serve(Some(accept));

            assert_eq!(response.status(), StatusCode::OK, "{accept}");
            assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
            assert_eq!(&response.body()[..], RESPONSE.as_bytes());
        }
    }

    #[test]
    fn test_gzip_preferred() {
        let response = serve(Some("gzip, deflate, br"));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );

        let mut body = String::new();
        GzDecoder::new(&response.body()[..])
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, RESPONSE);
    }

    #[test]
    fn test_deflate_when_gzip_absent() {
        let response = serve(Some("br, deflate"));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "deflate"
        );

        let mut body = String::new();
        DeflateDecoder::new(&response.body()[..])
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, RESPONSE);
    }

    #[test]
    fn test_accept_encoding_across_header_lines() {
        let mut req = Request::get("/")
            .header(header::ACCEPT_ENCODING, "br")
            .header(header::ACCEPT_ENCODING, "deflate;q=0.4, gzip;q=0.6")
            .body(Bytes::new())
            .unwrap();

        assert_eq!(negotiate(&mut req), Some(Codec::Gzip));
        assert!(req.headers().get(header::ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn test_content_length_dropped_when_compressing() {
        let handler = Compression::new(handler_fn(|sink, _req| {
            sink.headers_mut()
                .insert(header::CONTENT_LENGTH, RESPONSE.len().into());
            sink.write_all(RESPONSE.as_bytes()).unwrap();
        }));

        let mut recorder = Recorder::new();
        handler.serve(&mut recorder, &mut request(Some("gzip")));
        let response = recorder.into_response();

        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_status_preserved_when_compressing() {
        let handler = Compression::new(handler_fn(|sink, _req| {
            sink.write_status(StatusCode::NOT_FOUND);
            sink.write_all(b"nothing here").unwrap();
        }));

        let mut recorder = Recorder::new();
        handler.serve(&mut recorder, &mut request(Some("deflate")));
        let response = recorder.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let mut body = Vec::new();
        DeflateDecoder::new(&response.body()[..])
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"nothing here");
    }

    #[test]
    fn test_interim_status_before_compressed_body() {
        let handler = Compression::new(handler_fn(|sink, _req| {
            sink.write_status(StatusCode::CONTINUE);
            sink.write_all(b"hello hello hello").unwrap();
        }));

        let mut recorder = Recorder::new();
        handler.serve(&mut recorder, &mut request(Some("gzip")));
        assert_eq!(recorder.informational(), [StatusCode::CONTINUE]);
        let response = recorder.into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
        let mut body = String::new();
        GzDecoder::new(&response.body()[..])
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "hello hello hello");
    }

    #[test]
    fn test_broken_connection_aborts_response() {
        for (accept, attempts) in [(Some("gzip"), 2), (None, 1)] {
            let saw_error = Arc::new(AtomicBool::new(false));
            let handler = Compression::new(handler_fn({
                let saw_error = saw_error.clone();
                move |sink, _req| {
                    if sink.write_all(RESPONSE.as_bytes()).and_then(|()| sink.flush()).is_err() {
                        saw_error.store(true, Ordering::Relaxed);
                    }
                }
            }));

            let mut broken = BrokenSink::default();
            handler.serve(&mut broken, &mut request(accept));

            assert!(saw_error.load(Ordering::Relaxed), "{accept:?}");
            assert_eq!(broken.attempts, attempts, "{accept:?}");
        }
    }
}
