use crate::codec::Codec;
use crate::intercept::InterceptingSink;
use crate::sink::ResponseSink;
use compression_codecs::EncodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http::{HeaderMap, StatusCode, header};
use std::io;
use tracing::{error, trace};

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

/// A [`ResponseSink`] that compresses the body with a negotiated codec.
///
/// The decision is taken once, when the status is committed or the first body
/// byte arrives. From then on every write goes through the encoder, and the
/// stream is finalized by [`finish`](Self::finish) or, failing that, on drop.
pub struct CompressingSink<S: ResponseSink> {
    inner: InterceptingSink<S>,
    codec: Option<Codec>,
    applied: Option<Codec>,
    mode: Mode,
    encoder: Option<Box<dyn EncodeV2 + Send>>,
    output_buffer: Vec<u8>,
}

/// Where the sink is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Nothing committed yet; the encoding is still undecided.
    Pending,
    /// Bytes are forwarded as written.
    Identity,
    /// Bytes are forwarded through the encoder.
    Compressing,
    /// The stream has been finalized.
    Finished,
}

impl<S: ResponseSink> CompressingSink<S> {
    /// Wraps `inner`, compressing with `codec`, or passing bytes through
    /// unchanged when `codec` is `None`.
    pub fn new(inner: S, codec: Option<Codec>) -> Self {
        Self {
            inner: InterceptingSink::new(inner),
            codec,
            applied: None,
            mode: Mode::Pending,
            encoder: None,
            output_buffer: Vec::new(),
        }
    }

    /// Returns the codec applied to the body, once the encoding has been
    /// decided. `None` while undecided or when sending identity.
    pub fn codec(&self) -> Option<Codec> {
        self.applied
    }

    /// Returns the status captured on the way to the wrapped sink.
    pub fn status(&self) -> Option<StatusCode> {
        self.inner.status()
    }

    /// Returns whether a status has been committed.
    pub fn committed(&self) -> bool {
        self.inner.committed()
    }

    #[cfg(test)]
    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    /// Finalizes the compressed stream, writing the codec trailer.
    ///
    /// Calling this more than once is a no-op. A response that was never
    /// committed is left untouched.
    pub fn finish(&mut self) -> io::Result<()> {
        let mode = std::mem::replace(&mut self.mode, Mode::Finished);
        if mode != Mode::Compressing {
            return Ok(());
        }
        let Some(mut encoder) = self.encoder.take() else {
            return Ok(());
        };

        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            let done = encoder.finish(&mut output).map_err(io::Error::other)?;
            let written = output.written_len();
            if written > 0 {
                self.inner.write_all(&self.output_buffer[..written])?;
            }
            if done {
                break;
            }
        }
        trace!("compressed stream finished");
        Ok(())
    }

    /// Decides the encoding for a response about to carry `status`.
    fn decide(&mut self, status: StatusCode) {
        let compress = self.codec.is_some()
            && may_carry_body(status)
            && !self.inner.headers().contains_key(header::CONTENT_ENCODING)
            && !self.inner.headers().contains_key(header::CONTENT_RANGE);

        match self.codec.filter(|_| compress) {
            Some(codec) => {
                prepare_headers(self.inner.headers_mut(), codec);
                self.encoder = Some(codec.encoder());
                self.output_buffer = vec![0u8; OUTPUT_BUFFER_SIZE];
                self.applied = Some(codec);
                self.mode = Mode::Compressing;
            }
            None => self.mode = Mode::Identity,
        }
    }

    /// Runs `input` through the encoder and forwards whatever it produced.
    fn compress_chunk(&mut self, input: &[u8]) -> io::Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(io::Error::other("compression encoder missing"));
        };
        let mut input_buf = PartialBuffer::new(input);

        // Keep encoding until all input is consumed
        loop {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            encoder
                .encode(&mut input_buf, &mut output)
                .map_err(io::Error::other)?;

            let written = output.written_len();
            if written > 0 {
                self.inner.write_all(&self.output_buffer[..written])?;
            }

            if input_buf.written_len() >= input.len() {
                break;
            }
            // No progress in either direction; bail rather than spin.
            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::other("compression encoder stalled"));
            }
        }
        Ok(())
    }
}

impl<S: ResponseSink> ResponseSink for CompressingSink<S> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        // Informational responses precede the final one and do not fix it.
        if self.mode == Mode::Pending && !status.is_informational() {
            self.decide(status);
        }
        self.inner.write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == Mode::Pending {
            self.decide(StatusCode::OK);
        }
        match self.mode {
            Mode::Compressing => {
                self.compress_chunk(buf)?;
                Ok(buf.len())
            }
            Mode::Finished => Err(io::Error::other("write after compressed stream finished")),
            Mode::Pending | Mode::Identity => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.mode == Mode::Compressing {
            if let Some(encoder) = self.encoder.as_mut() {
                loop {
                    let mut output =
                        WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
                    let done = encoder.flush(&mut output).map_err(io::Error::other)?;
                    let written = output.written_len();
                    if written > 0 {
                        self.inner.write_all(&self.output_buffer[..written])?;
                    }
                    if done {
                        break;
                    }
                }
            }
        }
        self.inner.flush()
    }
}

impl<S: ResponseSink> Drop for CompressingSink<S> {
    fn drop(&mut self) {
        if self.mode == Mode::Compressing {
            if let Err(e) = self.finish() {
                error!("failed to finish compressed response: {}", e);
            }
        }
    }
}

/// Whether a response with this status may have a body at all.
fn may_carry_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

/// Rewrites the response headers for a body encoded with `codec`.
fn prepare_headers(headers: &mut HeaderMap, codec: Codec) {
    headers.insert(
        header::CONTENT_ENCODING,
        header::HeaderValue::from_static(codec.content_encoding()),
    );

    // Compressed size is unknown until the stream completes
    headers.remove(header::CONTENT_LENGTH);

    // Ranges over the compressed bytes cannot be served
    headers.remove(header::ACCEPT_RANGES);

    add_vary_accept_encoding(headers);
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    let present = headers.get_all(header::VARY).iter().any(|vary| {
        vary.to_str().is_ok_and(|vary_str| {
            vary_str.split(',').any(|v| {
                let v = v.trim();
                v == "*" || v.eq_ignore_ascii_case("accept-encoding")
            })
        })
    });

    if !present {
        headers.append(
            header::VARY,
            header::HeaderValue::from_static("accept-encoding"),
        );
    }
}
