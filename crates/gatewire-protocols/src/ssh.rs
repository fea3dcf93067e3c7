//! SSH passthrough (RFC 4253). The gateway validates the server's version
//! banner, then steps aside: key exchange and authentication run
//! client-side over the relay, with credentials delivered to the client in
//! the connection-options control message rather than interpreted here.

use async_trait::async_trait;
use bytes::BytesMut;
use log::debug;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, GatewayError, Handshake, Interactivity,
    ProtocolAdapter, Result, SessionReady, Transport, TransportKind,
};

/// RFC 4253 §4.2 caps the identification line at 255 bytes including CRLF.
const MAX_BANNER_LINE: usize = 255;

/// Pre-banner text lines a server may send before its identification
/// string, bounded so a chatty impostor cannot stall the handshake.
const MAX_PREAMBLE: usize = 16 * 1024;

pub struct SshAdapter {
    descriptor: AdapterDescriptor,
}

impl SshAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "ssh",
                TransportKind::Tcp,
                Interactivity::Relay,
                AuthMode::Delegated,
                "RFC 4253",
            ),
        }
    }
}

impl Default for SshAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for SshAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    /// Read through any pre-banner text until the `SSH-` identification
    /// line. Everything read, the banner included, is handed back so the
    /// relay can deliver it to the client byte-for-byte.
    async fn handshake(
        &self,
        transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        let mut buf = BytesMut::new();
        let mut scanned = 0;

        loop {
            while let Some(pos) = buf[scanned..].iter().position(|&b| b == b'\n') {
                let line_start = buf[..scanned + pos]
                    .iter()
                    .rposition(|&b| b == b'\n')
                    .map(|p| p + 1)
                    .unwrap_or(0);
                let line = &buf[line_start..scanned + pos];
                if line.starts_with(b"SSH-") {
                    if line.len() + 1 > MAX_BANNER_LINE {
                        return Err(GatewayError::ProtocolViolation(format!(
                            "SSH identification line of {} bytes exceeds the RFC 4253 limit",
                            line.len() + 1
                        )));
                    }
                    let version = String::from_utf8_lossy(line).trim_end().to_string();
                    if !version.starts_with("SSH-2.0-") && !version.starts_with("SSH-1.99-") {
                        return Err(GatewayError::ProtocolViolation(format!(
                            "unsupported SSH protocol version in banner: {version}"
                        )));
                    }
                    debug!("server identification: {}", version);
                    return Ok(Handshake::Ready(SessionReady {
                        banner: Some(buf.freeze()),
                    }));
                }
                scanned += pos + 1;
            }
            scanned = buf.len();

            if buf.len() > MAX_PREAMBLE {
                return Err(GatewayError::ProtocolViolation(
                    "no SSH identification line within the preamble limit".to_string(),
                ));
            }
            let n = transport.read_buf(&mut buf).await?;
            if n == 0 {
                return Err(GatewayError::UpstreamClosed);
            }
        }
    }
}
