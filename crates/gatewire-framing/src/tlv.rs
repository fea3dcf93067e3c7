//! Type-length-value attribute framing (RADIUS RFC 2865 §5 layout).
//!
//! Attribute wire format: `type(1) | length(1) | value(length-2)`, where
//! the length octet covers the two header octets.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Decoded, FramingError, Result};

const ATTR_HEADER_LEN: usize = 2;
const MAX_ATTR_LEN: usize = u8::MAX as usize;

/// One decoded TLV attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvAttribute {
    pub kind: u8,
    pub value: Bytes,
}

impl TlvAttribute {
    pub fn new(kind: u8, value: impl Into<Bytes>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Codec for TLV attribute streams.
#[derive(Debug, Clone, Copy)]
pub struct TlvCodec {
    max_value: usize,
}

impl TlvCodec {
    /// `max_value` bounds a single attribute's value, on top of the u8
    /// length field's own 253-byte ceiling.
    pub fn new(max_value: usize) -> Self {
        Self { max_value }
    }

    /// Decode one attribute.
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded<TlvAttribute>> {
        if buf.len() < ATTR_HEADER_LEN {
            return Ok(Decoded::NeedMore);
        }

        let kind = buf[0];
        let len = buf[1] as usize;
        if len < ATTR_HEADER_LEN {
            return Err(FramingError::InvalidLength(format!(
                "attribute length {len} below header size"
            )));
        }
        let value_len = len - ATTR_HEADER_LEN;
        if value_len > self.max_value {
            return Err(FramingError::FrameTooLarge {
                len: value_len,
                max: self.max_value,
            });
        }

        if buf.len() < len {
            return Ok(Decoded::NeedMore);
        }

        Ok(Decoded::Frame {
            frame: TlvAttribute {
                kind,
                value: Bytes::copy_from_slice(&buf[ATTR_HEADER_LEN..len]),
            },
            consumed: len,
        })
    }

    /// Decode every attribute in `buf`, which must hold a whole number of
    /// attributes (the usual case once an outer length-prefixed packet has
    /// been cut out of the stream).
    pub fn decode_all(&self, buf: &[u8]) -> Result<Vec<TlvAttribute>> {
        let mut attrs = Vec::new();
        let mut rest = buf;
        while !rest.is_empty() {
            match self.decode(rest)? {
                Decoded::Frame { frame, consumed } => {
                    attrs.push(frame);
                    rest = &rest[consumed..];
                }
                Decoded::NeedMore => {
                    return Err(FramingError::Malformed(format!(
                        "{} trailing bytes after last whole attribute",
                        rest.len()
                    )));
                }
            }
        }
        Ok(attrs)
    }

    /// Encode one attribute.
    pub fn encode(&self, attr: &TlvAttribute) -> Result<Bytes> {
        let len = ATTR_HEADER_LEN + attr.value.len();
        if attr.value.len() > self.max_value || len > MAX_ATTR_LEN {
            return Err(FramingError::FrameTooLarge {
                len: attr.value.len(),
                max: self.max_value.min(MAX_ATTR_LEN - ATTR_HEADER_LEN),
            });
        }
        let mut out = BytesMut::with_capacity(len);
        out.put_u8(attr.kind);
        out.put_u8(len as u8);
        out.extend_from_slice(&attr.value);
        Ok(out.freeze())
    }
}
