//! Buffered socket
//!
//! Turns a raw duplex stream into framed reads: `read(n)` resolves to exactly
//! `n` bytes, `read_any()` to whatever has been received. Bytes that arrive
//! ahead of the current read (a client pipelining its whole handshake into
//! one segment, for instance) stay in the accumulator for the next read.
//!
//! Reads take `&mut self`, so at most one is pending at any time and they are
//! served in the order they are issued.

use crate::error::SocketError;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Initial accumulator capacity
const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Open,
    /// Peer sent EOF or the transport failed
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Open,
    /// Locally closed or the transport failed
    Closed,
}

/// A duplex stream with an internal read accumulator
#[derive(Debug)]
pub struct BufferedSocket<S> {
    inner: S,
    buffer: BytesMut,
    read_state: ReadState,
    write_state: WriteState,
}

impl<S> BufferedSocket<S> {
    /// Wrap a stream
    pub fn new(inner: S) -> Self {
        BufferedSocket {
            inner,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            read_state: ReadState::Open,
            write_state: WriteState::Open,
        }
    }

    /// Number of bytes received but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether writes are still accepted
    pub fn is_writable(&self) -> bool {
        self.write_state == WriteState::Open
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Stop framing and hand the raw stream over to a relay.
    ///
    /// Returns the stream along with any bytes that were received but not
    /// consumed by a read; the caller must forward them before reading from
    /// the stream again.
    pub fn into_parts(self) -> (S, Bytes) {
        (self.inner, self.buffer.freeze())
    }
}

impl<S: AsyncRead + Unpin> BufferedSocket<S> {
    /// Read exactly `n` bytes
    pub async fn read(&mut self, n: usize) -> Result<Bytes, SocketError> {
        self.ensure_readable()?;
        while self.buffer.len() < n {
            self.fill().await?;
        }
        Ok(self.buffer.split_to(n).freeze())
    }

    /// Read a single byte
    pub async fn read_u8(&mut self) -> Result<u8, SocketError> {
        let byte = self.read(1).await?;
        Ok(byte[0])
    }

    /// Read whatever is buffered, waiting for at least one byte
    pub async fn read_any(&mut self) -> Result<Bytes, SocketError> {
        self.ensure_readable()?;
        if self.buffer.is_empty() {
            self.fill().await?;
        }
        Ok(self.buffer.split().freeze())
    }

    /// Wait for more bytes without consuming any.
    ///
    /// Whatever arrives stays buffered for the next read. Fails once the
    /// peer has ended the stream, so callers can watch a connection for
    /// closure while waiting on something else. Cancel safe.
    pub async fn fill_more(&mut self) -> Result<(), SocketError> {
        self.ensure_readable()?;
        self.fill().await
    }

    fn ensure_readable(&self) -> Result<(), SocketError> {
        match self.read_state {
            ReadState::Open => Ok(()),
            ReadState::Terminated => Err(SocketError::ReadOnClosed),
        }
    }

    /// Pull one chunk from the stream into the accumulator
    async fn fill(&mut self) -> Result<(), SocketError> {
        if self.buffer.capacity() - self.buffer.len() < READ_CHUNK {
            self.buffer.reserve(READ_CHUNK);
        }
        match self.inner.read_buf(&mut self.buffer).await {
            Ok(0) => {
                self.read_state = ReadState::Terminated;
                Err(SocketError::ReadOnClosed)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                self.read_state = ReadState::Terminated;
                self.write_state = WriteState::Closed;
                Err(SocketError::Io(e))
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> BufferedSocket<S> {
    /// Write all bytes and flush
    pub async fn write(&mut self, data: &[u8]) -> Result<(), SocketError> {
        if self.write_state == WriteState::Closed {
            return Err(SocketError::WriteOnClosed);
        }
        let result = async {
            self.inner.write_all(data).await?;
            self.inner.flush().await
        }
        .await;

        result.map_err(|e| {
            self.read_state = ReadState::Terminated;
            self.write_state = WriteState::Closed;
            SocketError::Io(e)
        })
    }

    /// Shut down the write side; calling it again does nothing
    pub async fn close(&mut self) {
        if self.write_state == WriteState::Open {
            self.write_state = WriteState::Closed;
            if let Err(e) = self.inner.shutdown().await {
                tracing::debug!("Shutdown error: {}", e);
            }
        }
    }
}
