//! Echo (RFC 862). The canonical opaque relay: no handshake, no framing,
//! every byte goes back out the other side.

use async_trait::async_trait;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Handshake, Interactivity, ProtocolAdapter,
    Result, SessionReady, Transport, TransportKind,
};

pub struct EchoAdapter {
    descriptor: AdapterDescriptor,
}

impl EchoAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "echo",
                TransportKind::Tcp,
                Interactivity::Relay,
                AuthMode::None,
                "RFC 862",
            ),
        }
    }
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for EchoAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        _transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        Ok(Handshake::Ready(SessionReady::default()))
    }
}
