//! Error taxonomy shared by the broker, relay engine, and adapters.

use std::time::Duration;

use gatewire_framing::FramingError;
use serde::Serialize;
use thiserror::Error;

/// Terminal failure of a session or probe.
///
/// None of these are retried inside the gateway; retry policy belongs to
/// the caller.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Target refused, unreachable, or failed to resolve.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Adapter handshake exceeded its time budget.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Malformed frame during handshake or probe.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The adapter requires a transport primitive this runtime cannot
    /// provide (UDP, raw sockets, mid-stream TLS upgrade, privileged
    /// source port). Never attempted.
    #[error("transport capability mismatch: {0}")]
    TransportCapabilityMismatch(String),

    /// Target closed the connection. During an established relay this is a
    /// normal termination; before handshake completion it is a failure.
    #[error("upstream closed the connection")]
    UpstreamClosed,

    /// Caller- or supervisor-initiated termination.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// No adapter registered under this protocol identifier.
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Concurrent session limit reached; no connection was attempted.
    #[error("session limit reached: {0}")]
    SessionLimit(String),

    /// Operation not supported by this adapter (e.g. probing a
    /// relay-capable protocol).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The client-facing channel closed before the session finished
    /// starting.
    #[error("client channel closed: {0}")]
    ChannelClosed(String),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire-stable error kind reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ConnectivityError,
    HandshakeTimeout,
    ProtocolViolation,
    TransportCapabilityMismatch,
    UpstreamClosed,
    Cancelled,
    UnknownProtocol,
    SessionLimit,
    Unsupported,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConnectivityError => "ConnectivityError",
            ErrorKind::HandshakeTimeout => "HandshakeTimeout",
            ErrorKind::ProtocolViolation => "ProtocolViolation",
            ErrorKind::TransportCapabilityMismatch => "TransportCapabilityMismatch",
            ErrorKind::UpstreamClosed => "UpstreamClosed",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::UnknownProtocol => "UnknownProtocol",
            ErrorKind::SessionLimit => "SessionLimit",
            ErrorKind::Unsupported => "Unsupported",
        };
        f.write_str(name)
    }
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Connectivity(_) => ErrorKind::ConnectivityError,
            GatewayError::HandshakeTimeout(_) => ErrorKind::HandshakeTimeout,
            GatewayError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            GatewayError::TransportCapabilityMismatch(_) => ErrorKind::TransportCapabilityMismatch,
            GatewayError::UpstreamClosed => ErrorKind::UpstreamClosed,
            GatewayError::Cancelled(_) => ErrorKind::Cancelled,
            GatewayError::UnknownProtocol(_) => ErrorKind::UnknownProtocol,
            GatewayError::SessionLimit(_) => ErrorKind::SessionLimit,
            GatewayError::Unsupported(_) => ErrorKind::Unsupported,
            GatewayError::ChannelClosed(_) => ErrorKind::Cancelled,
            GatewayError::Framing(_) => ErrorKind::ProtocolViolation,
            GatewayError::Io(_) => ErrorKind::ConnectivityError,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// `{kind, message}` pair surfaced in probe responses and session reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_taxonomy() {
        assert_eq!(
            GatewayError::Connectivity("refused".into()).kind(),
            ErrorKind::ConnectivityError
        );
        assert_eq!(
            GatewayError::HandshakeTimeout(Duration::from_secs(5)).kind(),
            ErrorKind::HandshakeTimeout
        );
        assert_eq!(GatewayError::UpstreamClosed.kind(), ErrorKind::UpstreamClosed);
        assert_eq!(
            GatewayError::Framing(FramingError::Malformed("x".into())).kind(),
            ErrorKind::ProtocolViolation
        );
    }

    #[test]
    fn kind_serializes_to_stable_name() {
        let json = serde_json::to_string(&ErrorKind::TransportCapabilityMismatch).unwrap();
        assert_eq!(json, "\"TransportCapabilityMismatch\"");
        assert_eq!(ErrorKind::HandshakeTimeout.to_string(), "HandshakeTimeout");
    }

    #[test]
    fn detail_carries_kind_and_message() {
        let detail = GatewayError::UnknownProtocol("gopher".into()).detail();
        assert_eq!(detail.kind, ErrorKind::UnknownProtocol);
        assert!(detail.message.contains("gopher"));
    }
}
