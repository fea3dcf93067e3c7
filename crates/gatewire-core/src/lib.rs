//! Core engine for the gatewire protocol gateway.
//!
//! The pieces fit together like this: an [`AdapterRegistry`] maps protocol
//! identifiers to [`ProtocolAdapter`] implementations; the
//! [`ConnectionBroker`] resolves an adapter, opens a [`Transport`] to the
//! target, runs the adapter's handshake under a timeout budget, and then
//! either reports a [`ProbeOutcome`] or hands the wire to the relay engine
//! ([`run_relay`]) with a [`TimeoutSupervisor`] watching the idle clock.
//! Session lifecycle, byte accounting, and the first-cancel-wins handle
//! live in [`session`]; failure taxonomy in [`error`] and [`classify`].

pub mod adapter;
pub mod broker;
pub mod classify;
pub mod error;
pub mod options;
pub mod registry;
pub mod relay;
pub mod session;
pub mod supervisor;
pub mod transport;

pub use adapter::{
    AdapterDescriptor, AuthMode, Frame, Handshake, Interactivity, ProbeOutcome,
    ProtocolAdapter, SessionReady, TransportKind, DEFAULT_MAX_FRAME,
};
pub use broker::{BrokerConfig, ConnectionBroker};
pub use classify::CloseReason;
pub use error::{ErrorDetail, ErrorKind, GatewayError, Result};
pub use options::ConnectOptions;
pub use registry::AdapterRegistry;
pub use relay::{client_channel, run_relay, ClientChannel, ClientPeer};
pub use session::{Session, SessionHandle, SessionReport, SessionState, SessionStats};
pub use supervisor::TimeoutSupervisor;
pub use transport::{Duplex, Transport};
