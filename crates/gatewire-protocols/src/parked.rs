//! Adapters whose transport requirement this runtime cannot satisfy.
//!
//! They still register, so the registry can answer "what would it take"
//! instead of "never heard of it". Their handshakes are unreachable: the
//! registry parks the descriptor and lookup reports the capability gap
//! before a session is ever created.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use gatewire_core::{
    AdapterDescriptor, AuthMode, ConnectOptions, Frame, GatewayError, Handshake, Interactivity,
    ProtocolAdapter, Result, Transport, TransportKind,
};
use gatewire_framing::TlvCodec;

fn parked_handshake(descriptor: &AdapterDescriptor) -> GatewayError {
    GatewayError::TransportCapabilityMismatch(format!(
        "{} requires {}",
        descriptor.protocol,
        descriptor.transport.requirement()
    ))
}

/// RADIUS (RFC 2865). UDP-only; the attribute codec is still exercised so
/// packet captures can be decoded offline.
pub struct RadiusAdapter {
    descriptor: AdapterDescriptor,
    codec: TlvCodec,
}

impl RadiusAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: AdapterDescriptor::new(
                "radius",
                TransportKind::Udp,
                Interactivity::Probe,
                AuthMode::Gateway,
                "RFC 2865",
            ),
            codec: TlvCodec::new(253),
        }
    }
}

impl Default for RadiusAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for RadiusAdapter {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn handshake(
        &self,
        _transport: &mut Transport,
        _options: &ConnectOptions,
    ) -> Result<Handshake> {
        Err(parked_handshake(&self.descriptor))
    }

    /// Decode a whole attribute block (the packet body after the 20-byte
    /// RADIUS header) into its attribute list.
    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        if buf.is_empty() {
            return Ok(None);
        }
        let attrs = self.codec.decode_all(buf)?;
        buf.advance(buf.len());
        Ok(Some(Frame::Attributes(attrs)))
    }
}

macro_rules! parked_adapter {
    ($name:ident, $protocol:literal, $transport:expr, $interactivity:expr, $auth:expr,
     $rfc:literal, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            descriptor: AdapterDescriptor,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    descriptor: AdapterDescriptor::new(
                        $protocol,
                        $transport,
                        $interactivity,
                        $auth,
                        $rfc,
                    ),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        #[async_trait]
        impl ProtocolAdapter for $name {
            fn descriptor(&self) -> &AdapterDescriptor {
                &self.descriptor
            }

            async fn handshake(
                &self,
                _transport: &mut Transport,
                _options: &ConnectOptions,
            ) -> Result<Handshake> {
                Err(parked_handshake(&self.descriptor))
            }
        }
    };
}

parked_adapter!(
    NtpAdapter,
    "ntp",
    TransportKind::Udp,
    Interactivity::Probe,
    AuthMode::None,
    "RFC 5905",
    "NTP (RFC 5905). UDP-only."
);

parked_adapter!(
    RloginAdapter,
    "rlogin",
    TransportKind::PrivilegedSourcePort,
    Interactivity::Relay,
    AuthMode::Delegated,
    "RFC 1282",
    "Rlogin (RFC 1282). The server requires a client source port below 1024."
);

parked_adapter!(
    FtpsAdapter,
    "ftps",
    TransportKind::TlsUpgrade,
    Interactivity::Relay,
    AuthMode::Delegated,
    "RFC 4217",
    "FTPS (RFC 4217). Needs a mid-stream TLS upgrade after `AUTH TLS`."
);
