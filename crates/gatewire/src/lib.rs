//! Umbrella crate for the gatewire protocol gateway.
//!
//! Re-exports the engine ([`gatewire_core`]), the framing primitives
//! ([`gatewire_framing`]), and the adapter set ([`gatewire_protocols`]),
//! plus a convenience constructor for a broker wired with the default
//! adapters.
//!
//! ```no_run
//! use gatewire::{default_broker, ConnectOptions};
//!
//! # async fn probe() {
//! let broker = default_broker(Default::default());
//! let outcome = broker.probe("daytime", ConnectOptions::new("10.0.0.5", 13)).await;
//! assert!(outcome.success);
//! # }
//! ```

pub use gatewire_core::{
    client_channel, AdapterDescriptor, AdapterRegistry, AuthMode, BrokerConfig, ClientChannel,
    ClientPeer, CloseReason, ConnectOptions, ConnectionBroker, ErrorDetail, ErrorKind, Frame,
    GatewayError, Handshake, Interactivity, ProbeOutcome, ProtocolAdapter, Result, Session,
    SessionHandle, SessionReady, SessionReport, SessionState, Transport, TransportKind,
};
pub use gatewire_framing as framing;
pub use gatewire_protocols as protocols;

use std::sync::Arc;

/// Sealed registry holding the default adapter set.
pub fn default_registry() -> Arc<AdapterRegistry> {
    let registry = AdapterRegistry::new();
    protocols::register_defaults(&registry);
    registry.seal();
    Arc::new(registry)
}

/// Broker over [`default_registry`].
pub fn default_broker(config: BrokerConfig) -> ConnectionBroker {
    ConnectionBroker::new(default_registry(), config)
}
