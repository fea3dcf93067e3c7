//! Character generator (RFC 864). The target streams printable ASCII
//! forever; the probe samples a bounded window, checks it really is the
//! chargen alphabet, and disconnects.

use async_trait::async_trait;
use bytes::BytesMut;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, GatewayError, Handshake, Interactivity,
    ProbeOutcome, ProtocolAdapter, Result, Transport, TransportKind,
};

/// Enough for at least one full 72-column pattern line plus terminators.
const SAMPLE_TARGET: usize = 160;

pub struct ChargenAdapter {
    descriptor: AdapterDescriptor,
}

impl ChargenAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "chargen",
                TransportKind::Tcp,
                Interactivity::Probe,
                AuthMode::None,
                "RFC 864",
            ),
        }
    }
}

impl Default for ChargenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_chargen_byte(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) || b == b'\r' || b == b'\n'
}

#[async_trait]
impl ProtocolAdapter for ChargenAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        let mut buf = BytesMut::with_capacity(SAMPLE_TARGET);
        while buf.len() < SAMPLE_TARGET {
            let n = transport.read_buf(&mut buf).await?;
            if n == 0 {
                break;
            }
        }
        if buf.is_empty() {
            return Err(GatewayError::UpstreamClosed);
        }
        if let Some(bad) = buf.iter().find(|&&b| !is_chargen_byte(b)) {
            return Err(GatewayError::ProtocolViolation(format!(
                "non-printable byte 0x{bad:02x} in chargen stream"
            )));
        }

        let first_line = buf[..]
            .split(|&b| b == b'\n')
            .next()
            .map(|line| String::from_utf8_lossy(line).trim_end().to_string())
            .unwrap_or_default();

        let mut metadata = serde_json::Map::new();
        metadata.insert("sample".to_string(), first_line.into());
        metadata.insert("bytes_read".to_string(), buf.len().into());
        Ok(Handshake::Complete(ProbeOutcome::ok(metadata)))
    }
}
