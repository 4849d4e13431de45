//! Connection wrapper that keeps the per-session bytes-sent counter.
//!
//! A probe session must be able to say exactly how many header bytes the
//! transport accepted, including when a write fails part way through the
//! header. `MeteredStream` counts what `poll_write` reports as written and
//! otherwise forwards everything to the wrapped stream.

use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::time::timeout;

pin_project! {
    /// A stream that counts the bytes accepted by its writer side.
    pub struct MeteredStream<S> {
        #[pin]
        inner: S,
        written: usize,
    }
}

impl<S> MeteredStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes the underlying transport has accepted so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Consumes the wrapper and returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead> AsyncRead for MeteredStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().inner.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.project();
        let poll = this.inner.poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            *this.written += *n;
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().inner.poll_shutdown(cx)
    }
}

/// Reads from an AsyncRead with a timeout.
///
/// Returns `Err(io::Error)` with kind `TimedOut` if the read doesn't complete
/// within the specified duration.
pub async fn read_with_timeout<R>(
    reader: &mut R,
    buf: &mut [u8],
    timeout_duration: Duration,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match timeout(timeout_duration, reader.read(buf)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "read operation timed out",
        )),
    }
}
