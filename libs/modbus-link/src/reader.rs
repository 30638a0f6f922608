//! Buffered byte source for frame decoding
//!
//! Decoders look ahead with [`FrameReader::peek`] and only remove bytes with
//! [`FrameReader::consume`] once they know how much of the stream a frame
//! occupies. Bytes read past the end of a frame stay buffered for the next
//! decode.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::MAX_PDU_SIZE;
use crate::error::{ModbusError, ModbusResult};

const INITIAL_CAPACITY: usize = 2 * (MAX_PDU_SIZE + 8);

/// Async byte source with look-ahead
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Wait until `n` bytes are buffered and return them without consuming
    ///
    /// Fails with [`ModbusError::EndOfStream`] if the source closes first; bytes
    /// already buffered are kept.
    pub async fn peek(&mut self, n: usize) -> ModbusResult<&[u8]> {
        while self.buf.len() < n {
            self.buf.reserve(n - self.buf.len());
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(ModbusError::EndOfStream);
            }
        }
        Ok(&self.buf[..n])
    }

    /// Remove up to `n` buffered bytes from the front of the stream
    pub fn consume(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    /// Read exactly `n` bytes
    pub async fn read_exact(&mut self, n: usize) -> ModbusResult<Bytes> {
        self.peek(n).await?;
        Ok(self.consume(n))
    }

    /// Number of bytes read from the source but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop every buffered byte, returning how many were dropped
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
