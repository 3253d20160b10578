use crate::sink::ResponseSink;
use http::{HeaderValue, StatusCode, header};
use std::io;

/// Writes a plain-text error response.
///
/// The body is the status line text, e.g. `404 Not Found`, followed by
/// `: message` when `message` is non-empty, and a newline. Length and encoding
/// headers left behind by a handler are dropped since they describe a body
/// that will not be sent.
pub fn write_error(sink: &mut dyn ResponseSink, status: StatusCode, message: &str) -> io::Result<()> {
    let headers = sink.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_ENCODING);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    let mut body = status_text(status);
    if !message.is_empty() {
        body.push_str(": ");
        body.push_str(message);
    }
    body.push('\n');

    sink.write_status(status);
    sink.write_all(body.as_bytes())
}

/// Returns `"<code> <reason>"` for a status, e.g. `500 Internal Server Error`.
pub(crate) fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
