//! Error classifier: pure mapping from low-level failures to the shared
//! taxonomy. Performs no I/O and never retries.

use std::io;
use std::time::Duration;

use crate::error::{ErrorDetail, ErrorKind, GatewayError};

/// Why a relay session ended.
///
/// The relay engine reports a reason, not an error: whether a given reason
/// is surfaced as a failure is decided here, in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client side closed its channel; the session drained and ended.
    ClientClosed,
    /// Target closed during an established relay. Normal termination.
    UpstreamClosed,
    /// Supervisor-initiated idle expiry.
    IdleTimeout(Duration),
    /// Caller-initiated cancel.
    Cancelled(String),
    /// Hard I/O error on either side.
    Io(String),
}

impl CloseReason {
    /// Error detail for the caller, or `None` for a normal termination.
    pub fn error_detail(&self) -> Option<ErrorDetail> {
        match self {
            CloseReason::ClientClosed | CloseReason::UpstreamClosed => None,
            CloseReason::IdleTimeout(after) => Some(ErrorDetail {
                kind: ErrorKind::Cancelled,
                message: format!("idle timeout after {after:?}"),
            }),
            CloseReason::Cancelled(msg) => Some(ErrorDetail {
                kind: ErrorKind::Cancelled,
                message: msg.clone(),
            }),
            CloseReason::Io(msg) => Some(ErrorDetail {
                kind: ErrorKind::ConnectivityError,
                message: msg.clone(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_detail().is_some()
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::UpstreamClosed => write!(f, "upstream closed"),
            CloseReason::IdleTimeout(after) => write!(f, "idle timeout after {after:?}"),
            CloseReason::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            CloseReason::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

/// Classify a failure while opening the transport connection.
pub fn classify_connect(host: &str, port: u16, err: &io::Error) -> GatewayError {
    let cause = match err.kind() {
        io::ErrorKind::ConnectionRefused => "connection refused",
        io::ErrorKind::TimedOut => "connect timed out",
        _ => "connect failed",
    };
    GatewayError::Connectivity(format!("{cause}: {host}:{port}: {err}"))
}

/// Classify connect-timeout expiry (tokio reports elapsed separately from
/// the underlying socket error).
pub fn classify_connect_timeout(host: &str, port: u16, after: Duration) -> GatewayError {
    GatewayError::Connectivity(format!("connect to {host}:{port} timed out after {after:?}"))
}
