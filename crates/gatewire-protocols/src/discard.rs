//! Discard (RFC 863). Relay-capable; the target never answers, so the
//! gateway only ever moves bytes one way.

use async_trait::async_trait;
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Handshake, Interactivity, ProtocolAdapter,
    Result, SessionReady, Transport, TransportKind,
};

pub struct DiscardAdapter {
    descriptor: AdapterDescriptor,
}

impl DiscardAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "discard",
                TransportKind::Tcp,
                Interactivity::Relay,
                AuthMode::None,
                "RFC 863",
            ),
        }
    }
}

impl Default for DiscardAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for DiscardAdapter {
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
