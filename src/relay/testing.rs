//! In-memory connections for tests

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Duplex stream whose reads or writes can be made to fail
pub(crate) struct FaultyStream {
    inner: DuplexStream,
    fail_reads: bool,
    fail_writes: bool,
}

impl FaultyStream {
    pub(crate) fn healthy(inner: DuplexStream) -> Self {
        Self { inner, fail_reads: false, fail_writes: false }
    }

    /// Every read fails with `ConnectionReset`
    pub(crate) fn failing_reads(inner: DuplexStream) -> Self {
        Self { inner, fail_reads: true, fail_writes: false }
    }

    /// Every write fails with `BrokenPipe`; reads pass through
    pub(crate) fn failing_writes(inner: DuplexStream) -> Self {
        Self { inner, fail_reads: false, fail_writes: true }
    }
}

impl AsyncRead for FaultyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.fail_reads {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FaultyStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
