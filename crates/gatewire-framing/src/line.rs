//! CRLF / LF line framing for text protocols (daytime, finger, chargen,
//! SMTP-style banners).

use bytes::Bytes;

use crate::{Decoded, FramingError, Result};

/// Codec for newline-terminated lines.
///
/// Decodes up to the first `\n`, stripping an optional preceding `\r`.
/// Encoding appends `\r\n` as every line-oriented RFC in the current
/// adapter set expects.
#[derive(Debug, Clone, Copy)]
pub struct LineCodec {
    max_line: usize,
}

impl LineCodec {
    /// `max_line` bounds the line length including the terminator.
    pub fn new(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Decode one line from `buf`. The terminator is consumed but not part
    /// of the returned bytes.
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded<Bytes>> {
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos + 1 > self.max_line {
                    return Err(FramingError::FrameTooLarge {
                        len: pos + 1,
                        max: self.max_line,
                    });
                }
                let end = if pos > 0 && buf[pos - 1] == b'\r' {
                    pos - 1
                } else {
                    pos
                };
                Ok(Decoded::Frame {
                    frame: Bytes::copy_from_slice(&buf[..end]),
                    consumed: pos + 1,
                })
            }
            None => {
                if buf.len() >= self.max_line {
                    return Err(FramingError::FrameTooLarge {
                        len: buf.len(),
                        max: self.max_line,
                    });
                }
                Ok(Decoded::NeedMore)
            }
        }
    }

    /// Encode `line` with a trailing CRLF.
    pub fn encode(&self, line: &[u8]) -> Bytes {
        let mut out = Vec::with_capacity(line.len() + 2);
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
        Bytes::from(out)
    }
}
