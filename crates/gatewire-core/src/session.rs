//! Session bookkeeping: identity, state machine, byte counters, and the
//! idempotent cancel handle shared by callers and the timeout supervisor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::classify::CloseReason;
use crate::error::ErrorDetail;

/// Per-session state machine. `Errored` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Connecting,
    Handshaking,
    Probing,
    Relaying,
    Closed,
    Errored,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Pending => "pending",
            SessionState::Connecting => "connecting",
            SessionState::Handshaking => "handshaking",
            SessionState::Probing => "probing",
            SessionState::Relaying => "relaying",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Byte counters and the activity clock, shared between the relay engine
/// and the timeout supervisor. Counters are only ever written by the
/// session that owns them.
pub struct SessionStats {
    epoch: Instant,
    bytes_to_client: AtomicU64,
    bytes_to_target: AtomicU64,
    last_activity_ms: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            epoch: Instant::now(),
            bytes_to_client: AtomicU64::new(0),
            bytes_to_target: AtomicU64::new(0),
            last_activity_ms: AtomicU64::new(0),
        })
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Reset the idle clock. Called on every relayed byte, both directions.
    pub fn touch(&self) {
        self.last_activity_ms.store(self.now_ms(), Ordering::Relaxed);
    }

    pub fn record_to_client(&self, n: usize) {
        self.bytes_to_client.fetch_add(n as u64, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_to_target(&self, n: usize) {
        self.bytes_to_target.fetch_add(n as u64, Ordering::Relaxed);
        self.touch();
    }

    pub fn bytes_to_client(&self) -> u64 {
        self.bytes_to_client.load(Ordering::Relaxed)
    }

    pub fn bytes_to_target(&self) -> u64 {
        self.bytes_to_target.load(Ordering::Relaxed)
    }

    /// Time since the last byte transferred in either direction.
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }
}

/// Cancel handle for an active session. Cloneable; the first `cancel` wins
/// and later calls are no-ops, so double-close releases everything exactly
/// once and produces exactly one terminal result.
#[derive(Clone)]
pub struct SessionHandle {
    cancel_tx: Arc<Mutex<Option<oneshot::Sender<CloseReason>>>>,
    cancel_rx: Arc<Mutex<Option<oneshot::Receiver<CloseReason>>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            cancel_tx: Arc::new(Mutex::new(Some(tx))),
            cancel_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Request session termination. Returns true if this call delivered
    /// the cancel, false if the session was already cancelled or finished.
    pub fn cancel(&self, reason: CloseReason) -> bool {
        let sender = match self.cancel_tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(reason).is_ok(),
            None => false,
        }
    }

    /// Take the receiver half. The broker claims it when the session
    /// starts; a handle can only drive one session.
    pub(crate) fn take_cancel_rx(&self) -> Option<oneshot::Receiver<CloseReason>> {
        self.cancel_rx.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One logical connection attempt.
pub struct Session {
    pub id: Uuid,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub state: SessionState,
    pub created_at: Instant,
    pub stats: Arc<SessionStats>,
}

impl Session {
    pub fn new(protocol: &str, host: &str, port: u16) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            state: SessionState::Pending,
            created_at: Instant::now(),
            stats: SessionStats::new(),
        };
        debug!("session {} created for {}://{}:{}", session.id, protocol, host, port);
        session
    }

    pub fn transition(&mut self, to: SessionState) {
        debug!("session {}: {} -> {}", self.id, self.state, to);
        self.state = to;
    }
}

/// Structured result of a completed relay session.
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub protocol: String,
    pub close_reason: CloseReason,
    /// Wall-clock time from session creation to the terminal state.
    pub duration: Duration,
    pub bytes_to_client: u64,
    pub bytes_to_target: u64,
    /// Present when the close reason classifies as a failure.
    pub error: Option<ErrorDetail>,
}
