//! Daytime (RFC 867). One human-readable line from the target, reported
//! as probe metadata.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use gatewire_core::adapter::read_frame;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Frame, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::{Decoded, LineCodec};

const MAX_DAYTIME_LINE: usize = 512;

pub struct DaytimeAdapter {
    descriptor: AdapterDescriptor,
    codec: LineCodec,
}

impl DaytimeAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "daytime",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 867",
            )
            .with_max_frame(MAX_DAYTIME_LINE),
            codec: LineCodec::new(MAX_DAYTIME_LINE),
        }
    }
}

impl Default for DaytimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for DaytimeAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        let mut buf = BytesMut::new();
        let frame = read_frame(self, transport, &mut buf).await?;
        let Frame::Line(line) = frame else {
            return Err(GatewayError::ProtocolViolation(
                "daytime decode yielded a non-line frame".to_string(),
            ));
        };
        if line.is_empty() {
            return Err(GatewayError::ProtocolViolation(
                "empty daytime string".to_string(),
            ));
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "daytime".to_string(),
            String::from_utf8_lossy(&line).into_owned().into(),
        );
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }

    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.codec.decode(buf)? {
            Decoded::Frame { frame, consumed } => {
                buf.advance(consumed);
                Ok(Some(Frame::Line(frame)))
            }
            Decoded::NeedMore => Ok(None),
        }
    }
}
