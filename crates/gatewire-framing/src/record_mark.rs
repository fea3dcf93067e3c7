//! ONC-RPC record marking (RFC 5531 §11).
//!
//! Each record is a sequence of fragments. A fragment starts with a 4-byte
//! big-endian header: the high bit marks the last fragment of the record,
//! the low 31 bits hold the fragment length. The decoded record is the
//! concatenation of all fragment payloads.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Decoded, FramingError, Result};

const LAST_FRAGMENT: u32 = 0x8000_0000;
const FRAGMENT_LEN_MASK: u32 = 0x7FFF_FFFF;
const HEADER_LEN: usize = 4;

/// Codec for record-marked RPC streams.
#[derive(Debug, Clone, Copy)]
pub struct RecordMarkCodec {
    max_record: usize,
}

impl RecordMarkCodec {
    /// `max_record` bounds the reassembled record, summed over fragments.
    pub fn new(max_record: usize) -> Self {
        Self { max_record }
    }

    /// Decode one complete record (all fragments through the last-fragment
    /// marker). Consumes nothing until the whole record is present.
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded<Bytes>> {
        let mut offset = 0;
        let mut record = BytesMut::new();

        loop {
            if buf.len() < offset + HEADER_LEN {
                return Ok(Decoded::NeedMore);
            }

            let header = u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]);
            let frag_len = (header & FRAGMENT_LEN_MASK) as usize;
            let last = header & LAST_FRAGMENT != 0;

            if record.len() + frag_len > self.max_record {
                return Err(FramingError::FrameTooLarge {
                    len: record.len() + frag_len,
                    max: self.max_record,
                });
            }
            // A zero-length non-final fragment would let a peer spin us
            // forever without ever completing a record.
            if frag_len == 0 && !last {
                return Err(FramingError::Malformed(
                    "zero-length non-final fragment".to_string(),
                ));
            }

            if buf.len() < offset + HEADER_LEN + frag_len {
                return Ok(Decoded::NeedMore);
            }

            record.extend_from_slice(&buf[offset + HEADER_LEN..offset + HEADER_LEN + frag_len]);
            offset += HEADER_LEN + frag_len;

            if last {
                return Ok(Decoded::Frame {
                    frame: record.freeze(),
                    consumed: offset,
                });
            }
        }
    }

    /// Encode `record` as a single last-marked fragment.
    pub fn encode(&self, record: &[u8]) -> Result<Bytes> {
        if record.len() > self.max_record || record.len() > FRAGMENT_LEN_MASK as usize {
            return Err(FramingError::FrameTooLarge {
                len: record.len(),
                max: self.max_record,
            });
        }
        let mut out = BytesMut::with_capacity(HEADER_LEN + record.len());
        out.put_u32(LAST_FRAGMENT | record.len() as u32);
        out.extend_from_slice(record);
        Ok(out.freeze())
    }
}
