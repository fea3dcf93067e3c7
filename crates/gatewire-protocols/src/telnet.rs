//! Telnet (RFC 854). Option negotiation and the login dialogue are
//! relayed untouched; the client-side terminal answers IAC sequences. The
//! adapter contributes a keepalive so NAT mappings survive quiet shells.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Handshake, Interactivity, ProtocolAdapter,
    Result, SessionReady, Transport, TransportKind,
};

const IAC: u8 = 0xff;
const NOP: u8 = 0xf1;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

pub struct TelnetAdapter {
    descriptor: AdapterDescriptor,
}

impl TelnetAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "telnet",
                TransportKind::Tcp,
                Interactivity::Relay,
                AuthMode::None,
                "RFC 854",
            )
            .with_keepalive_interval(KEEPALIVE_INTERVAL),
        }
    }
}

impl Default for TelnetAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for TelnetAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        _transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        // Negotiation happens inside the relay; there is nothing to do
        // before handing the wire over.
        Ok(Handshake::Ready(SessionReady::default()))
    }

    fn keepalive_frame(&self) -> Option<Bytes> {
        Some(Bytes::from_static(&[IAC, NOP]))
    }
}
