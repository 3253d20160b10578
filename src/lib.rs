//! Composable HTTP handler middleware.
//!
//! Handlers write their response into a [`ResponseSink`]. The middleware in
//! this crate wrap a handler, decorate the sink it writes into, and are
//! stacked with [`tower::ServiceBuilder`]:
//!
//! ```
//! use http_response_middleware::{
//!     CompressionLayer, HandlerService, PanicGuardLayer, ResponseSink, handler_fn,
//! };
//! use tower::ServiceBuilder;
//!
//! let pipeline = ServiceBuilder::new()
//!     .layer(PanicGuardLayer::new())
//!     .layer(CompressionLayer::new())
//!     .service(handler_fn(|sink, _req| {
//!         if let Err(e) = sink.write_all(b"{pi:3.14159265}") {
//!             tracing::debug!("client went away: {}", e);
//!         }
//!     }));
//!
//! // Serve it through any Tower-compatible HTTP server.
//! let service = HandlerService::new(pipeline);
//! ```
//!
//! # Layers
//!
//! - [`PanicGuardLayer`] answers a handler panic with `500 Internal Server
//!   Error`, or lets it propagate when configured to. Put it outermost.
//! - [`CompressionLayer`] negotiates `gzip` or `deflate` from the request's
//!   `Accept-Encoding` header, removes that header before the inner handler
//!   runs, and streams the body through the chosen encoder.
//! - [`StatusCounterLayer`](counter::StatusCounterLayer) counts responses
//!   per status class.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to the codec used
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Accept-Ranges` header is removed
//! - `Vary` header includes `Accept-Encoding`
//!
//! Responses that already carry `Content-Encoding` or `Content-Range`, and
//! statuses without a body (`1xx`, `204`, `304`), are sent as is.

#![deny(missing_docs)]

mod codec;
mod compress;
mod compression;
pub mod counter;
mod error;
mod future;
mod guard;
mod handler;
mod intercept;
mod prefix;
mod recorder;
mod service;
mod sink;

pub use codec::{AcceptEncoding, Codec, Preference};
pub use compress::CompressingSink;
pub use compression::{Compression, CompressionLayer};
pub use error::write_error;
pub use future::ResponseFuture;
pub use guard::{Fault, GuardConfig, Outcome, PanicGuard, PanicGuardLayer};
pub use handler::{Handler, HandlerFn, handler_fn};
pub use intercept::InterceptingSink;
pub use prefix::{prefix, shift_path};
pub use recorder::Recorder;
pub use service::HandlerService;
pub use sink::ResponseSink;
