use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_matrix, payload_elements, FrameConfig, DIM_HEADER_SIZE, ELEMENT_SIZE};
use crate::error::{FrameError, Result};
use crate::matrix::Matrix;

/// Reads status bytes and matrix frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Timeouts reported by the stream surface as [`FrameError::Io`] with
/// `ErrorKind::TimedOut` or `ErrorKind::WouldBlock`.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            config,
        }
    }

    /// Read a single byte. Returns `Ok(None)` at end of stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Read the next complete matrix frame (blocking).
    ///
    /// Returns `Err(FrameError::MalformedFrame)` if the stream ends before
    /// all announced elements arrive.
    pub fn read_matrix(&mut self) -> Result<Matrix> {
        self.buf.clear();
        self.buf.resize(DIM_HEADER_SIZE, 0);
        let got = fill(&mut self.inner, &mut self.buf[..])?;
        if got < DIM_HEADER_SIZE {
            return Err(FrameError::MalformedFrame(format!(
                "stream ended after {got} of {DIM_HEADER_SIZE} header bytes"
            )));
        }

        let rows = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        let cols = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
        let elements = payload_elements(rows, cols, self.config.max_elements)?;
        let needed = elements * ELEMENT_SIZE;
        trace!(rows, cols, needed, "reading matrix payload");

        self.buf.resize(DIM_HEADER_SIZE + needed, 0);
        let got = fill(&mut self.inner, &mut self.buf[DIM_HEADER_SIZE..])?;
        if got < needed {
            return Err(FrameError::MalformedFrame(format!(
                "stream ended after {got} of {needed} payload bytes for {rows}x{cols} matrix"
            )));
        }

        let mut src = &self.buf[..];
        decode_matrix(&mut src, self.config.max_elements)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

// Reads until `dst` is full or the stream ends; returns bytes read.
fn fill<T: Read>(inner: &mut T, dst: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < dst.len() {
        match inner.read(&mut dst[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}
