//! Session timeout supervisor.
//!
//! Watches a session's activity clock and requests termination through the
//! same cancel path a caller would use; the relay engine cannot tell a
//! timeout from a cancel, only the error classifier reports the reason
//! differently. Optionally injects an adapter-declared keepalive frame at
//! a fixed cadence, independent of the idle accounting.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::classify::CloseReason;
use crate::session::{SessionHandle, SessionStats};

pub struct TimeoutSupervisor {
    stats: Arc<SessionStats>,
    handle: SessionHandle,
    idle_timeout: Option<Duration>,
    max_duration: Option<Duration>,
    keepalive: Option<(Duration, Bytes, mpsc::Sender<Bytes>)>,
}

impl TimeoutSupervisor {
    pub fn new(stats: Arc<SessionStats>, handle: SessionHandle) -> Self {
        Self {
            stats,
            handle,
            idle_timeout: None,
            max_duration: None,
            keepalive: None,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Absolute cap on session lifetime, measured from supervisor start
    /// and unaffected by activity.
    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn with_keepalive(
        mut self,
        interval: Duration,
        frame: Bytes,
        tx: mpsc::Sender<Bytes>,
    ) -> Self {
        self.keepalive = Some((interval, frame, tx));
        self
    }

    /// Run until the idle timeout fires or the task is dropped with the
    /// session. The idle deadline is recomputed from the activity clock on
    /// every wake, so it can never fire earlier than the threshold
    /// measured from the last transferred byte.
    pub async fn run(self) {
        let started = Instant::now();
        let hard_deadline = self.max_duration.map(|limit| started + limit);
        let mut next_keepalive = self
            .keepalive
            .as_ref()
            .map(|(interval, _, _)| Instant::now() + *interval);

        loop {
            let idle_deadline = self
                .idle_timeout
                .map(|t| Instant::now() + t.saturating_sub(self.stats.idle_for()));

            let wake = match [idle_deadline, next_keepalive, hard_deadline]
                .into_iter()
                .flatten()
                .min()
            {
                Some(wake) => wake,
                None => return,
            };

            sleep(wake.saturating_duration_since(Instant::now())).await;

            if let Some(deadline) = hard_deadline {
                if Instant::now() >= deadline {
                    let limit = self.max_duration.unwrap_or_default();
                    debug!("session duration cap ({:?}) reached, cancelling", limit);
                    self.handle.cancel(CloseReason::Cancelled(format!(
                        "maximum session duration {limit:?} reached"
                    )));
                    return;
                }
            }

            if let (Some((interval, frame, tx)), Some(due)) =
                (self.keepalive.as_ref(), next_keepalive)
            {
                if Instant::now() >= due {
                    if tx.send(frame.clone()).await.is_err() {
                        // Relay is gone; nothing left to supervise for.
                        return;
                    }
                    next_keepalive = Some(due + *interval);
                }
            }

            if let Some(timeout) = self.idle_timeout {
                if self.stats.idle_for() >= timeout {
                    debug!("idle timeout ({:?}) expired, cancelling session", timeout);
                    self.handle.cancel(CloseReason::IdleTimeout(timeout));
                    return;
                }
            }
        }
    }
}
