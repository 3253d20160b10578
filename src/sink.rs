use http::{HeaderMap, StatusCode};
use std::io;

/// The outbound half of a request: where a handler puts its status, headers
/// and body bytes.
///
/// Middleware decorates a sink by implementing this trait around another one
/// and forwarding whatever it does not care about.
pub trait ResponseSink {
    /// Returns the response headers that will be sent when the status is
    /// committed.
    fn headers(&self) -> &HeaderMap;

    /// Returns the response headers for modification.
    ///
    /// Changes made after the status has been committed have no effect on the
    /// wire.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the response status.
    fn write_status(&mut self, status: StatusCode);

    /// Writes body bytes, committing a `200 OK` status first if none was
    /// written yet.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Pushes any buffered body bytes towards the client.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Writes the whole buffer.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        (**self).write_status(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        (**self).write_status(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// A sink whose connection has gone away: every body write fails.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct BrokenSink {
    pub(crate) headers: HeaderMap,
    pub(crate) attempts: usize,
}

#[cfg(test)]
impl ResponseSink for BrokenSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, _status: StatusCode) {}

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.attempts += 1;
        Err(io::ErrorKind::BrokenPipe.into())
    }
}
