//! Protocol adapter contract.
//!
//! Every protocol behind the gateway implements [`ProtocolAdapter`]:
//! capability metadata, a handshake that either finishes a probe or hands
//! off to the relay engine, and decode/encode over the framing primitives.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use gatewire_framing::TlvAttribute;
use serde_json::{Map, Value};

use crate::error::{ErrorDetail, GatewayError, Result};
use crate::options::ConnectOptions;
use crate::transport::Transport;

/// Default cap on a single decoded frame.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Transport primitive a protocol requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
    RawSocket,
    /// TLS negotiated mid-stream on an established connection (e.g. FTPS
    /// `AUTH TLS`).
    TlsUpgrade,
    /// Protocols that must originate from ports below 1024 (e.g. rlogin).
    PrivilegedSourcePort,
}

impl TransportKind {
    /// Whether the current runtime can satisfy this requirement.
    pub fn is_available(&self) -> bool {
        matches!(self, TransportKind::Tcp)
    }

    pub fn requirement(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "TCP",
            TransportKind::Udp => "UDP",
            TransportKind::RawSocket => "raw socket",
            TransportKind::TlsUpgrade => "mid-stream TLS upgrade",
            TransportKind::PrivilegedSourcePort => "privileged source port",
        }
    }
}

/// Probe-only vs. relay-capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interactivity {
    Probe,
    Relay,
}

/// Who performs authentication for this protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication exchange at all.
    None,
    /// The gateway itself authenticates during handshake.
    Gateway,
    /// Authentication happens client-side over the relayed bytes; the
    /// gateway only forwards connection options, never interprets them.
    Delegated,
}

/// Immutable, registered-once capability metadata.
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    pub protocol: &'static str,
    pub transport: TransportKind,
    pub interactivity: Interactivity,
    pub auth: AuthMode,
    /// Human-readable RFC reference, e.g. "RFC 862".
    pub rfc: &'static str,
    /// Per-adapter handshake budget; overrides the broker default, and is
    /// itself overridden by a per-request value.
    pub handshake_timeout: Option<Duration>,
    /// Keepalive cadence, independent of the idle timeout.
    pub keepalive_interval: Option<Duration>,
    /// Maximum decoded frame size, enforced by the framing primitives.
    pub max_frame: usize,
}

impl AdapterDescriptor {
    pub fn new(
        protocol: &'static str,
        transport: TransportKind,
        interactivity: Interactivity,
        auth: AuthMode,
        rfc: &'static str,
    ) -> Self {
        Self {
            protocol,
            transport,
            interactivity,
            auth,
            rfc,
            handshake_timeout: None,
            keepalive_interval: None,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    pub fn with_handshake_timeout(mut self, budget: Duration) -> Self {
        self.handshake_timeout = Some(budget);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }
}

/// One decoded protocol message unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Uninterpreted bytes (established class-1/3 relays).
    Opaque(Bytes),
    /// A newline-terminated text line, terminator stripped.
    Line(Bytes),
    /// A reassembled record-marked RPC record.
    Record(Bytes),
    /// A length-prefixed packet payload.
    Packet(Bytes),
    /// A decoded TLV attribute set.
    Attributes(Vec<TlvAttribute>),
}

/// Token returned by a relay-capable handshake.
#[derive(Debug, Default)]
pub struct SessionReady {
    /// Bytes the adapter already read from the target (e.g. an SSH version
    /// banner) which the broker must forward to the client before the
    /// opaque relay starts.
    pub banner: Option<Bytes>,
}

/// Result of an adapter handshake.
#[derive(Debug)]
pub enum Handshake {
    /// Relay-capable session established; hand off to the relay engine.
    Ready(SessionReady),
    /// Probe finished; the session is over.
    Complete(ProbeOutcome),
}

/// Terminal result of a non-interactive probe.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ProbeOutcome {
    pub fn ok(metadata: Map<String, Value>) -> Self {
        Self {
            success: true,
            metadata,
            error: None,
        }
    }

    pub fn failure(err: &GatewayError) -> Self {
        Self {
            success: false,
            metadata: Map::new(),
            error: Some(err.detail()),
        }
    }
}

/// The polymorphic protocol contract. One implementation per protocol,
/// selected once at session start and never re-dispatched mid-session.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn descriptor(&self) -> &AdapterDescriptor;

    /// Perform the protocol's initial exchange within the broker-enforced
    /// time budget. Probe-only adapters return `Handshake::Complete`;
    /// relay-capable adapters return `Handshake::Ready`.
    async fn handshake(
        &self,
        transport: &mut Transport,
        options: &ConnectOptions,
    ) -> Result<Handshake>;

    /// Decode one frame from `buf`, advancing it past the consumed bytes.
    /// `None` means more bytes are needed; nothing was consumed. The
    /// caller retains the buffer.
    ///
    /// The default is the opaque-relay behavior: the whole buffer is one
    /// frame.
    fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        if buf.is_empty() {
            return Ok(None);
        }
        let data = buf.split().freeze();
        Ok(Some(Frame::Opaque(data)))
    }

    /// Encode a frame back to wire bytes.
    fn encode(&self, frame: &Frame) -> Result<Bytes> {
        match frame {
            Frame::Opaque(data) => Ok(data.clone()),
            other => Err(GatewayError::Unsupported(format!(
                "{} adapter cannot encode {:?}",
                self.descriptor().protocol,
                other
            ))),
        }
    }

    /// Bytes the supervisor injects at the declared keepalive interval.
    fn keepalive_frame(&self) -> Option<Bytes> {
        None
    }
}

/// Read from `transport` until the adapter produces one frame.
///
/// End-of-stream before a complete frame surfaces as `UpstreamClosed`,
/// which the broker treats as a failure during handshake.
pub async fn read_frame(
    adapter: &dyn ProtocolAdapter,
    transport: &mut Transport,
    buf: &mut BytesMut,
) -> Result<Frame> {
    loop {
        if let Some(frame) = adapter.decode(buf)? {
            return Ok(frame);
        }
        let n = transport.read_buf(buf).await?;
        if n == 0 {
            return Err(GatewayError::UpstreamClosed);
        }
    }
}
