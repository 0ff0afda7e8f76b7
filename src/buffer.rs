//! Byte accumulator feeding the frame decoder.
//!
//! Transport reads land here in whatever sizes the socket hands out; the decoder pulls
//! whole lines while reading headers and exact byte counts while reading bodies.

use bytes::{Bytes, BytesMut};

use crate::constants::{BUF_CHUNK, MAX_BUFFER_SIZE};
use crate::error::{EslError, EslResult};

/// Growable receive buffer backed by `BytesMut`.
#[derive(Debug)]
pub struct EslBuffer {
    data: BytesMut,
    /// Bytes already searched for `\n` without a hit.
    scanned: usize,
}

impl EslBuffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(BUF_CHUNK),
            scanned: 0,
        }
    }

    /// Append bytes, refusing to grow past [`MAX_BUFFER_SIZE`].
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> EslResult<()> {
        if self.data.len() + bytes.len() > MAX_BUFFER_SIZE {
            return Err(EslError::protocol_error(format!(
                "receive buffer would exceed {} bytes",
                MAX_BUFFER_SIZE
            )));
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Remove and return the next line without its `\n` terminator.
    ///
    /// Returns `None` while no complete line is buffered. A trailing `\r` is kept; the
    /// caller decides what to do with it.
    pub fn extract_line(&mut self) -> Option<Bytes> {
        let newline = self.data[self.scanned..]
            .iter()
            .position(|&b| b == b'\n');
        match newline {
            Some(offset) => {
                let end = self.scanned + offset;
                let mut line = self
                    .data
                    .split_to(end + 1);
                line.truncate(end);
                self.scanned = 0;
                Some(line.freeze())
            }
            None => {
                self.scanned = self.data.len();
                None
            }
        }
    }

    /// Remove and return exactly `len` bytes, or `None` if fewer are buffered.
    pub fn extract_bytes(&mut self, len: usize) -> Option<Bytes> {
        if self.data.len() < len {
            return None;
        }
        self.scanned = self
            .scanned
            .saturating_sub(len);
        Some(
            self.data
                .split_to(len)
                .freeze(),
        )
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for EslBuffer {
    fn default() -> Self {
        Self::new()
    }
}
