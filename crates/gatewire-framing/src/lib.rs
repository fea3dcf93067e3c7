//! Framing primitives shared by every protocol adapter.
//!
//! Each codec is fed an incrementally growing byte buffer and either asks
//! for more bytes (consuming nothing), yields one decoded unit plus the
//! number of bytes it consumed, or fails with a [`FramingError`]. Decoding
//! never panics on malformed input and never reads past the frame boundary.
//! Encoding is pure: no I/O, total over well-formed frames.
//!
//! Maximum sizes are declared at codec construction and enforced here, not
//! by each adapter individually.

use thiserror::Error;

mod fixed;
mod length_prefix;
mod line;
mod record_mark;
mod tlv;

pub use fixed::FixedCodec;
pub use length_prefix::{LengthPrefixCodec, PrefixWidth};
pub use line::LineCodec;
pub use record_mark::RecordMarkCodec;
pub use tlv::{TlvAttribute, TlvCodec};

/// Result of one decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// One complete unit, plus the number of buffer bytes it consumed.
    /// The caller advances its buffer by `consumed`.
    Frame { frame: T, consumed: usize },
    /// The buffer does not yet hold a complete unit. Nothing was consumed.
    NeedMore,
}

impl<T> Decoded<T> {
    /// The decoded frame, if complete.
    pub fn frame(self) -> Option<T> {
        match self {
            Decoded::Frame { frame, .. } => Some(frame),
            Decoded::NeedMore => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid length field: {0}")]
    InvalidLength(String),

    #[error("invalid terminator: {0}")]
    InvalidTerminator(String),

    #[error("malformed frame: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, FramingError>;
