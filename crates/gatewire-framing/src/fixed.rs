//! Fixed-size binary units (RFC 868 time words, fixed protocol headers).

use bytes::Bytes;

use crate::{Decoded, FramingError, Result};

/// Codec that cuts the stream into units of exactly `size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct FixedCodec {
    size: usize,
}

impl FixedCodec {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn decode(&self, buf: &[u8]) -> Result<Decoded<Bytes>> {
        if buf.len() < self.size {
            return Ok(Decoded::NeedMore);
        }
        Ok(Decoded::Frame {
            frame: Bytes::copy_from_slice(&buf[..self.size]),
            consumed: self.size,
        })
    }

    /// Encode a unit, verifying it has the declared size.
    pub fn encode(&self, unit: &[u8]) -> Result<Bytes> {
        if unit.len() != self.size {
            return Err(FramingError::Malformed(format!(
                "fixed unit of {} bytes, expected {}",
                unit.len(),
                self.size
            )));
        }
        Ok(Bytes::copy_from_slice(unit))
    }
}
