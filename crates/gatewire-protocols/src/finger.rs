//! Finger (RFC 1288). The probe writes one query line (the `query` param,
//! or the empty query listing signed-on users) and reads the response
//! until the target closes.

use async_trait::async_trait;
use bytes::BytesMut;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::LineCodec;

const MAX_QUERY_LINE: usize = 256;

pub struct FingerAdapter {
    descriptor: AdapterDescriptor,
    codec: LineCodec,
}

impl FingerAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "finger",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 1288",
            ),
            codec: LineCodec::new(MAX_QUERY_LINE),
        }
    }
}

impl Default for FingerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for FingerAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        options: &ConnectOptions,
    ) -> Result<Handshake> {
        let query = options.get_param("query").unwrap_or("");
        if query.len() + 2 > MAX_QUERY_LINE {
            return Err(GatewayError::Unsupported(format!(
                "finger query of {} bytes exceeds the {} byte line limit",
                query.len(),
                MAX_QUERY_LINE
            )));
        }
        transport.write_all(&self.codec.encode(query.as_bytes())).await?;

        let mut buf = BytesMut::new();
        loop {
            let n = transport.read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
            if buf.len() > self.descriptor.max_frame {
                return Err(GatewayError::ProtocolViolation(format!(
                    "finger response exceeds {} bytes",
                    self.descriptor.max_frame
                )));
            }
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("query".to_string(), query.into());
        metadata.insert(
            "response".to_string(),
            String::from_utf8_lossy(&buf).into_owned().into(),
        );
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }
}
