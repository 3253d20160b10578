use http::uri::{PathAndQuery, Uri};
use http::Request;
use tracing::debug;

/// Splits off the first segment of the cleaned `path`.
///
/// The path is cleaned first: repeated slashes collapse, `.` segments are
/// dropped, `..` removes the segment before it, and the trailing slash goes.
/// Returns the segment without slashes and the remainder, which always starts
/// with `/`:
///
/// ```
/// use http_response_middleware::shift_path;
///
/// assert_eq!(shift_path("/api/v1/users"), ("api".to_owned(), "/v1/users".to_owned()));
/// assert_eq!(shift_path("/users"), ("users".to_owned(), "/".to_owned()));
/// assert_eq!(shift_path("/a/../b/"), ("b".to_owned(), "/".to_owned()));
/// ```
pub fn shift_path(path: &str) -> (String, String) {
    let cleaned = clean_path(path);
    let rest = &cleaned[1..];
    match rest.find('/') {
        Some(i) => (rest[..i].to_owned(), rest[i..].to_owned()),
        None => (rest.to_owned(), "/".to_owned()),
    }
}

/// Lexically cleans `path` into a rooted path without a trailing slash.
fn clean_path(path: &str) -> String {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Strips the first path segment from the request URI and returns it.
///
/// The query string is kept. A request with an empty path is left as is and
/// yields an empty string.
pub fn prefix<B>(req: &mut Request<B>) -> String {
    let path = req.uri().path();
    if path.is_empty() {
        return String::new();
    }

    let (head, tail) = shift_path(path);
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{tail}?{query}"),
        None => tail,
    };

    let mut parts = req.uri().clone().into_parts();
    let rebuilt = PathAndQuery::try_from(path_and_query)
        .map_err(http::Error::from)
        .and_then(|pq| {
            parts.path_and_query = Some(pq);
            Uri::from_parts(parts).map_err(http::Error::from)
        });

    match rebuilt {
        Ok(uri) => *req.uri_mut() = uri,
        Err(e) => debug!("could not rewrite request path: {}", e),
    }
    head
}
