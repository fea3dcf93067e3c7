//! Connection broker: resolves the adapter, opens the transport, drives
//! the handshake, and either returns a probe outcome or hands the session
//! to the relay engine under supervision.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::adapter::{
    AdapterDescriptor, AuthMode, Handshake, Interactivity, ProbeOutcome, ProtocolAdapter,
};
use crate::classify::CloseReason;
use crate::error::{ErrorKind, GatewayError, Result};
use crate::options::ConnectOptions;
use crate::registry::AdapterRegistry;
use crate::relay::{self, run_relay, ClientChannel, ClientPeer};
use crate::session::{Session, SessionHandle, SessionReport, SessionState};
use crate::supervisor::TimeoutSupervisor;
use crate::transport::Transport;

/// Process-wide broker policy.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Transport connect budget. Bounded below to avoid indefinite hangs.
    pub connect_timeout: Duration,
    /// Default handshake budget; a per-adapter or per-request value wins.
    pub handshake_timeout: Duration,
    /// Default idle timeout for relay sessions. `None` disables it.
    pub idle_timeout: Option<Duration>,
    /// Absolute cap on relay session lifetime, independent of activity.
    /// `None` means sessions may run indefinitely while busy.
    pub max_session_duration: Option<Duration>,
    /// Maximum concurrent sessions, probes included.
    pub max_sessions: usize,
    /// Client channel capacity per direction (relay backpressure bound).
    pub channel_capacity: usize,
    /// Opaque placement/region hint supplied by the scheduler. Logged at
    /// session start, never interpreted or recomputed here.
    pub placement_hint: Option<String>,
}

/// Floor for caller-supplied connect timeouts.
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            // 15 minutes, matching the classic RFC test-server policy.
            idle_timeout: Some(Duration::from_secs(900)),
            max_session_duration: None,
            max_sessions: 256,
            channel_capacity: 32,
            placement_hint: None,
        }
    }
}

pub struct ConnectionBroker {
    registry: Arc<AdapterRegistry>,
    config: BrokerConfig,
    active: Arc<AtomicUsize>,
}

/// Decrements the active-session count when a session ends, however it
/// ends.
struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConnectionBroker {
    pub fn new(registry: Arc<AdapterRegistry>, config: BrokerConfig) -> Self {
        Self {
            registry,
            config,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Client channel pair bounded by the configured capacity.
    pub fn client_channel(&self) -> (ClientChannel, ClientPeer) {
        relay::client_channel(self.config.channel_capacity)
    }

    /// Run a one-shot probe. Always produces exactly one structured
    /// outcome; failures are folded in rather than returned as `Err`.
    pub async fn probe(&self, protocol: &str, options: ConnectOptions) -> ProbeOutcome {
        match self.probe_inner(protocol, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("probe of {} failed: {}", protocol, e);
                ProbeOutcome::failure(&e)
            }
        }
    }

    async fn probe_inner(&self, protocol: &str, options: ConnectOptions) -> Result<ProbeOutcome> {
        let adapter = self.registry.lookup(protocol)?;
        let descriptor = adapter.descriptor().clone();
        if descriptor.interactivity != Interactivity::Probe {
            return Err(GatewayError::Unsupported(format!(
                "{protocol} is relay-capable, not probe-only"
            )));
        }

        let _slot = self.claim_slot(protocol)?;
        let mut session = Session::new(protocol, &options.host, options.port);
        if let Some(hint) = &self.config.placement_hint {
            debug!("session {}: placement hint {}", session.id, hint);
        }

        session.transition(SessionState::Connecting);
        let mut transport = match self.connect(&options).await {
            Ok(t) => t,
            Err(e) => {
                session.transition(SessionState::Errored);
                return Err(e);
            }
        };

        session.transition(SessionState::Handshaking);
        let result = self
            .run_handshake(adapter.as_ref(), &descriptor, &mut transport, &options)
            .await;

        // The broker closes the transport right after a probe, success or
        // not.
        let _ = transport.shutdown().await;

        match result {
            Ok(Handshake::Complete(outcome)) => {
                session.transition(SessionState::Probing);
                session.transition(SessionState::Closed);
                info!(
                    "probe {} against {}:{} -> success={}",
                    protocol, options.host, options.port, outcome.success
                );
                Ok(outcome)
            }
            Ok(Handshake::Ready(_)) => {
                session.transition(SessionState::Errored);
                Err(GatewayError::Unsupported(format!(
                    "{protocol} handshake unexpectedly produced a relay session"
                )))
            }
            Err(e) => {
                session.transition(SessionState::Errored);
                Err(e)
            }
        }
    }

    /// Open a relay session and drive it to completion.
    ///
    /// Pre-relay failures return `Err`; once the relay starts, the
    /// session always ends with exactly one `SessionReport`.
    pub async fn open(
        &self,
        protocol: &str,
        options: ConnectOptions,
        client: ClientChannel,
        handle: SessionHandle,
    ) -> Result<SessionReport> {
        let adapter = self.registry.lookup(protocol)?;
        let descriptor = adapter.descriptor().clone();
        if descriptor.interactivity != Interactivity::Relay {
            return Err(GatewayError::Unsupported(format!(
                "{protocol} is probe-only, not relay-capable"
            )));
        }
        let cancel_rx = handle.take_cancel_rx().ok_or_else(|| {
            GatewayError::Unsupported("session handle already drove a session".to_string())
        })?;

        let _slot = self.claim_slot(protocol)?;
        let mut session = Session::new(protocol, &options.host, options.port);
        if let Some(hint) = &self.config.placement_hint {
            debug!("session {}: placement hint {}", session.id, hint);
        }

        session.transition(SessionState::Connecting);
        let mut transport = match self.connect(&options).await {
            Ok(t) => t,
            Err(e) => {
                session.transition(SessionState::Errored);
                return Err(e);
            }
        };

        session.transition(SessionState::Handshaking);
        let ready = match self
            .run_handshake(adapter.as_ref(), &descriptor, &mut transport, &options)
            .await
        {
            Ok(Handshake::Ready(ready)) => ready,
            Ok(Handshake::Complete(_)) => {
                session.transition(SessionState::Errored);
                let _ = transport.shutdown().await;
                return Err(GatewayError::Unsupported(format!(
                    "{protocol} handshake unexpectedly finished as a probe"
                )));
            }
            Err(e) => {
                session.transition(SessionState::Errored);
                let _ = transport.shutdown().await;
                return Err(e);
            }
        };

        // Delegated-auth adapters get the connection options as a typed
        // control message before any target byte reaches the client.
        if descriptor.auth == AuthMode::Delegated {
            client
                .to_client
                .send(options.control_message())
                .await
                .map_err(|_| {
                    GatewayError::ChannelClosed(
                        "client left before connection options were delivered".to_string(),
                    )
                })?;
        }
        if let Some(banner) = &ready.banner {
            client
                .to_client
                .send(banner.clone())
                .await
                .map_err(|_| GatewayError::ChannelClosed("client left during startup".to_string()))?;
            session.stats.record_to_client(banner.len());
        }

        session.transition(SessionState::Relaying);
        let idle_timeout = options.idle_timeout.or(self.config.idle_timeout);
        let (supervisor_task, keepalive_rx) =
            match self.spawn_supervisor(&session, &descriptor, adapter.as_ref(), &handle, idle_timeout) {
                Some((task, rx)) => (Some(task), rx),
                None => (None, None),
            };

        let reason = run_relay(
            transport,
            client,
            Arc::clone(&session.stats),
            cancel_rx,
            keepalive_rx,
        )
        .await;

        if let Some(task) = supervisor_task {
            task.abort();
        }
        Ok(self.finish(&mut session, reason))
    }

    fn finish(&self, session: &mut Session, reason: CloseReason) -> SessionReport {
        let error = reason.error_detail();
        session.transition(if error.is_some() {
            SessionState::Errored
        } else {
            SessionState::Closed
        });
        let duration = session.created_at.elapsed();
        info!(
            "session {} ended after {:?}: {} ({} bytes to client, {} to target)",
            session.id,
            duration,
            reason,
            session.stats.bytes_to_client(),
            session.stats.bytes_to_target()
        );
        SessionReport {
            session_id: session.id,
            protocol: session.protocol.clone(),
            close_reason: reason,
            duration,
            bytes_to_client: session.stats.bytes_to_client(),
            bytes_to_target: session.stats.bytes_to_target(),
            error,
        }
    }

    fn claim_slot(&self, protocol: &str) -> Result<SessionSlot> {
        let claimed = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < self.config.max_sessions {
                    Some(n + 1)
                } else {
                    None
                }
            });
        match claimed {
            Ok(_) => Ok(SessionSlot {
                active: Arc::clone(&self.active),
            }),
            Err(_) => {
                warn!("session limit {} reached, rejecting {}", self.config.max_sessions, protocol);
                Err(GatewayError::SessionLimit(format!(
                    "{} concurrent sessions",
                    self.config.max_sessions
                )))
            }
        }
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Transport> {
        let connect_timeout = options
            .connect_timeout
            .unwrap_or(self.config.connect_timeout)
            .max(MIN_CONNECT_TIMEOUT);
        Transport::connect(&options.host, options.port, connect_timeout).await
    }

    /// Most specific handshake budget wins: per-request override, then the
    /// adapter descriptor, then the broker default.
    fn resolve_handshake_budget(
        &self,
        descriptor: &AdapterDescriptor,
        options: &ConnectOptions,
    ) -> Duration {
        options
            .handshake_timeout
            .or(descriptor.handshake_timeout)
            .unwrap_or(self.config.handshake_timeout)
    }

    async fn run_handshake(
        &self,
        adapter: &dyn ProtocolAdapter,
        descriptor: &AdapterDescriptor,
        transport: &mut Transport,
        options: &ConnectOptions,
    ) -> Result<Handshake> {
        let budget = self.resolve_handshake_budget(descriptor, options);
        let started = Instant::now();
        match timeout(budget, adapter.handshake(transport, options)).await {
            Err(_) => Err(GatewayError::HandshakeTimeout(budget)),
            Ok(result) => apply_handshake_deadline(result, started.elapsed(), budget),
        }
    }

    fn spawn_supervisor(
        &self,
        session: &Session,
        descriptor: &AdapterDescriptor,
        adapter: &dyn ProtocolAdapter,
        handle: &SessionHandle,
        idle_timeout: Option<Duration>,
    ) -> Option<(tokio::task::JoinHandle<()>, Option<mpsc::Receiver<bytes::Bytes>>)> {
        let keepalive = descriptor
            .keepalive_interval
            .zip(adapter.keepalive_frame());
        let max_duration = self.config.max_session_duration;

        if idle_timeout.is_none() && keepalive.is_none() && max_duration.is_none() {
            return None;
        }

        let mut supervisor =
            TimeoutSupervisor::new(Arc::clone(&session.stats), handle.clone());
        if let Some(timeout) = idle_timeout {
            supervisor = supervisor.with_idle_timeout(timeout);
        }
        if let Some(limit) = max_duration {
            supervisor = supervisor.with_max_duration(limit);
        }
        let keepalive_rx = match keepalive {
            Some((interval, frame)) => {
                let (tx, rx) = mpsc::channel(4);
                supervisor = supervisor.with_keepalive(interval, frame, tx);
                Some(rx)
            }
            None => None,
        };

        Some((tokio::spawn(supervisor.run()), keepalive_rx))
    }
}

/// Tie-break for results arriving at or past the deadline: a framing or
/// protocol violation is reported as a timeout, since a partial frame cut
/// off by the budget says nothing about the target. Other failures keep
/// their own kind; a connection reset is a reset no matter when it lands.
fn apply_handshake_deadline(
    result: Result<Handshake>,
    elapsed: Duration,
    budget: Duration,
) -> Result<Handshake> {
    match result {
        Err(e) if elapsed >= budget && e.kind() == ErrorKind::ProtocolViolation => {
            Err(GatewayError::HandshakeTimeout(budget))
        }
        other => other,
    }
}
