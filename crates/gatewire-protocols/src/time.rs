//! Time protocol (RFC 868). The target sends one 32-bit big-endian word:
//! seconds since 1900-01-01 UTC. Unix time is that minus 2208988800.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use chrono::DateTime;
use gatewire_core::adapter::read_frame;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Frame, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::{Decoded, FixedCodec};

/// Seconds between the RFC 868 epoch (1900) and the Unix epoch (1970).
const EPOCH_OFFSET: i64 = 2_208_988_800;

pub struct TimeAdapter {
    descriptor: AdapterDescriptor,
    codec: FixedCodec,
}

impl TimeAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "time",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 868",
            )
            .with_max_frame(4),
            codec: FixedCodec::new(4),
        }
    }
}

impl Default for TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for TimeAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        let mut buf = BytesMut::new();
        let Frame::Packet(word) = read_frame(self, transport, &mut buf).await? else {
            return Err(GatewayError::ProtocolViolation(
                "time decode yielded a non-packet frame".to_string(),
            ));
        };

        let raw = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
        let unix = i64::from(raw) - EPOCH_OFFSET;

        let mut metadata = serde_json::Map::new();
        metadata.insert("seconds_since_1900".to_string(), raw.into());
        metadata.insert("unix_time".to_string(), unix.into());
        if let Some(instant) = DateTime::from_timestamp(unix, 0) {
            metadata.insert("iso8601".to_string(), instant.to_rfc3339().into());
        }
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }

    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.codec.decode(buf)? {
            Decoded::Frame { frame, consumed } => {
                buf.advance(consumed);
                Ok(Some(Frame::Packet(frame)))
            }
            Decoded::NeedMore => Ok(None),
        }
    }
}
