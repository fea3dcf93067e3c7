//! Big-endian length-prefixed records (DNS over TCP, many binary RPCs).

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Decoded, FramingError, Result};

/// Width of the length prefix preceding each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixWidth {
    U8,
    U16,
    U32,
}

impl PrefixWidth {
    fn size(self) -> usize {
        match self {
            PrefixWidth::U8 => 1,
            PrefixWidth::U16 => 2,
            PrefixWidth::U32 => 4,
        }
    }

    fn read(self, buf: &[u8]) -> usize {
        match self {
            PrefixWidth::U8 => buf[0] as usize,
            PrefixWidth::U16 => u16::from_be_bytes([buf[0], buf[1]]) as usize,
            PrefixWidth::U32 => u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize,
        }
    }

    fn max_value(self) -> usize {
        match self {
            PrefixWidth::U8 => u8::MAX as usize,
            PrefixWidth::U16 => u16::MAX as usize,
            PrefixWidth::U32 => u32::MAX as usize,
        }
    }
}

/// Codec for `<length><payload>` records with a big-endian prefix.
///
/// The declared length is validated against `max_payload` before any
/// payload bytes are buffered, so a hostile peer cannot force unbounded
/// memory growth by announcing a huge record.
#[derive(Debug, Clone, Copy)]
pub struct LengthPrefixCodec {
    width: PrefixWidth,
    max_payload: usize,
}

impl LengthPrefixCodec {
    pub fn new(width: PrefixWidth, max_payload: usize) -> Self {
        Self { width, max_payload }
    }

    /// Decode one record payload (without its prefix).
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded<Bytes>> {
        let prefix = self.width.size();
        if buf.len() < prefix {
            return Ok(Decoded::NeedMore);
        }

        let len = self.width.read(buf);
        if len > self.max_payload {
            return Err(FramingError::FrameTooLarge {
                len,
                max: self.max_payload,
            });
        }

        if buf.len() < prefix + len {
            return Ok(Decoded::NeedMore);
        }

        Ok(Decoded::Frame {
            frame: Bytes::copy_from_slice(&buf[prefix..prefix + len]),
            consumed: prefix + len,
        })
    }

    /// Encode `payload` with its length prefix.
    pub fn encode(&self, payload: &[u8]) -> Result<Bytes> {
        if payload.len() > self.max_payload || payload.len() > self.width.max_value() {
            return Err(FramingError::FrameTooLarge {
                len: payload.len(),
                max: self.max_payload.min(self.width.max_value()),
            });
        }

        let mut out = BytesMut::with_capacity(self.width.size() + payload.len());
        match self.width {
            PrefixWidth::U8 => out.put_u8(payload.len() as u8),
            PrefixWidth::U16 => out.put_u16(payload.len() as u16),
            PrefixWidth::U32 => out.put_u32(payload.len() as u32),
        }
        out.extend_from_slice(payload);
        Ok(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_u16_record() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U16, 1024);
        let mut data = vec![0x00, 0x05];
        data.extend_from_slice(b"hello tail");
        match codec.decode(&data).unwrap() {
            Decoded::Frame { frame, consumed } => {
                assert_eq!(frame.as_ref(), b"hello");
                assert_eq!(consumed, 7);
            }
            Decoded::NeedMore => panic!("expected a record"),
        }
    }

    #[test]
    fn short_prefix_needs_more() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U32, 1024);
        assert_eq!(codec.decode(&[0, 0, 1]).unwrap(), Decoded::NeedMore);
    }

    #[test]
    fn short_payload_needs_more() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U16, 1024);
        assert_eq!(codec.decode(&[0x00, 0x08, b'a']).unwrap(), Decoded::NeedMore);
    }

    #[test]
    fn oversized_declared_length_rejected_before_buffering() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U16, 16);
        // Prefix alone declares 40000 bytes; no payload present yet.
        let err = codec.decode(&[0x9C, 0x40]).unwrap_err();
        assert!(matches!(err, FramingError::FrameTooLarge { max: 16, .. }));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U8, 1024);
        let payload = vec![0u8; 300];
        assert!(codec.encode(&payload).is_err());
    }

    #[test]
    fn round_trip_all_widths() {
        for width in [PrefixWidth::U8, PrefixWidth::U16, PrefixWidth::U32] {
            let codec = LengthPrefixCodec::new(width, 200);
            let encoded = codec.encode(b"payload").unwrap();
            let decoded = codec.decode(&encoded).unwrap().frame().unwrap();
            assert_eq!(decoded.as_ref(), b"payload");
        }
    }

    #[test]
    fn incremental_equivalence() {
        let codec = LengthPrefixCodec::new(PrefixWidth::U16, 64);
        let mut stream = Vec::new();
        stream.extend_from_slice(&codec.encode(b"one").unwrap());
        stream.extend_from_slice(&codec.encode(b"two").unwrap());

        let mut whole = Vec::new();
        let mut buf = stream.clone();
        while let Decoded::Frame { frame, consumed } = codec.decode(&buf).unwrap() {
            whole.push(frame);
            buf.drain(..consumed);
        }

        let mut chunked = Vec::new();
        let mut buf = Vec::new();
        for &b in stream.iter() {
            buf.push(b);
            while let Decoded::Frame { frame, consumed } = codec.decode(&buf).unwrap() {
                chunked.push(frame);
                buf.drain(..consumed);
            }
        }

        assert_eq!(whole, chunked);
        assert_eq!(whole.len(), 2);
    }
}
