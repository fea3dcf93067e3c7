//! Relay engine: bidirectional, protocol-opaque byte forwarding between
//! the client-facing channel and the target transport.
//!
//! Backpressure comes from the bounded client channel and awaited target
//! writes: when a destination stalls, the engine stops reading from the
//! corresponding source. Half-close on one side flushes in-flight bytes,
//! then shuts only the write direction of the other side; full termination
//! needs both directions done, a hard I/O error, or a cancel.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use crate::classify::CloseReason;
use crate::session::SessionStats;
use crate::transport::Transport;

const RELAY_BUF_SIZE: usize = 8192;

/// Gateway side of the client-facing duplex channel.
pub struct ClientChannel {
    pub to_client: mpsc::Sender<Bytes>,
    pub from_client: mpsc::Receiver<Bytes>,
}

/// Client side of the pair, used by callers and tests.
pub struct ClientPeer {
    pub to_gateway: mpsc::Sender<Bytes>,
    pub from_gateway: mpsc::Receiver<Bytes>,
}

/// Build a connected channel pair with the given per-direction capacity.
pub fn client_channel(capacity: usize) -> (ClientChannel, ClientPeer) {
    let (to_client, from_gateway) = mpsc::channel(capacity);
    let (to_gateway, from_client) = mpsc::channel(capacity);
    (
        ClientChannel {
            to_client,
            from_client,
        },
        ClientPeer {
            to_gateway,
            from_gateway,
        },
    )
}

enum Raced<T> {
    Done(T),
    Cancelled(CloseReason),
}

/// Race one suspension point against the cancel signal. Every blocking
/// write or channel send in the relay goes through here, so a stalled
/// peer cannot hold up cancellation.
async fn race_cancel<F>(
    cancel_rx: &mut oneshot::Receiver<CloseReason>,
    fut: F,
) -> Raced<F::Output>
where
    F: std::future::Future,
{
    tokio::select! {
        reason = &mut *cancel_rx => Raced::Cancelled(reason.unwrap_or_else(|_| {
            CloseReason::Cancelled("session handle dropped".to_string())
        })),
        value = fut => Raced::Done(value),
    }
}

/// Pump bytes in both directions until the session ends.
///
/// `keepalive_rx` delivers supervisor-injected frames; they are written to
/// the target but deliberately bypass the byte counters and the idle
/// clock. Injection stops once the client half-closes, since the target
/// write side is shut from that point on.
pub async fn run_relay(
    transport: Transport,
    client: ClientChannel,
    stats: Arc<SessionStats>,
    mut cancel_rx: oneshot::Receiver<CloseReason>,
    mut keepalive_rx: Option<mpsc::Receiver<Bytes>>,
) -> CloseReason {
    let (mut target_read, mut target_write) = transport.into_split();
    let ClientChannel {
        to_client,
        mut from_client,
    } = client;
    let mut to_client = Some(to_client);

    let mut buf = vec![0u8; RELAY_BUF_SIZE];
    let mut client_eof = false;
    let mut upstream_eof = false;

    loop {
        tokio::select! {
            reason = &mut cancel_rx => {
                let reason = reason.unwrap_or_else(|_| {
                    CloseReason::Cancelled("session handle dropped".to_string())
                });
                debug!("relay cancelled: {}", reason);
                let _ = target_write.shutdown().await;
                return reason;
            }

            maybe = from_client.recv(), if !client_eof => {
                match maybe {
                    Some(data) => {
                        trace!("client->target: {} bytes", data.len());
                        let write = async {
                            target_write.write_all(&data).await?;
                            target_write.flush().await
                        };
                        match race_cancel(&mut cancel_rx, write).await {
                            Raced::Cancelled(reason) => {
                                debug!("relay cancelled: {}", reason);
                                let _ = target_write.shutdown().await;
                                return reason;
                            }
                            Raced::Done(Err(e)) => {
                                warn!("target write failed: {}", e);
                                return CloseReason::Io(e.to_string());
                            }
                            Raced::Done(Ok(())) => stats.record_to_target(data.len()),
                        }
                    }
                    None => {
                        debug!("client EOF, half-closing target write side");
                        client_eof = true;
                        // The write side is closing; injected frames have
                        // nowhere to go.
                        keepalive_rx = None;
                        let _ = target_write.shutdown().await;
                        if upstream_eof {
                            return CloseReason::UpstreamClosed;
                        }
                    }
                }
            }

            result = target_read.read(&mut buf), if !upstream_eof => {
                match result {
                    Ok(0) => {
                        debug!("upstream EOF, half-closing client channel");
                        upstream_eof = true;
                        // Dropping the sender propagates the half-close.
                        to_client = None;
                        if client_eof {
                            return CloseReason::UpstreamClosed;
                        }
                    }
                    Ok(n) => {
                        trace!("target->client: {} bytes", n);
                        let delivered = match to_client.as_ref() {
                            Some(tx) => {
                                let send = tx.send(Bytes::copy_from_slice(&buf[..n]));
                                match race_cancel(&mut cancel_rx, send).await {
                                    Raced::Cancelled(reason) => {
                                        debug!("relay cancelled: {}", reason);
                                        let _ = target_write.shutdown().await;
                                        return reason;
                                    }
                                    Raced::Done(result) => result.is_ok(),
                                }
                            }
                            None => false,
                        };
                        if !delivered {
                            debug!("client channel gone, ending relay");
                            let _ = target_write.shutdown().await;
                            return CloseReason::ClientClosed;
                        }
                        stats.record_to_client(n);
                    }
                    Err(e) => {
                        warn!("target read failed: {}", e);
                        return CloseReason::Io(e.to_string());
                    }
                }
            }

            frame = async {
                match keepalive_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some(frame) = frame {
                    trace!("keepalive: {} bytes", frame.len());
                    let write = async {
                        target_write.write_all(&frame).await?;
                        target_write.flush().await
                    };
                    match race_cancel(&mut cancel_rx, write).await {
                        Raced::Cancelled(reason) => {
                            debug!("relay cancelled: {}", reason);
                            let _ = target_write.shutdown().await;
                            return reason;
                        }
                        Raced::Done(Err(e)) => return CloseReason::Io(e.to_string()),
                        Raced::Done(Ok(())) => {}
                    }
                }
            }
        }

        if client_eof && upstream_eof {
            return CloseReason::UpstreamClosed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use tokio::io::duplex;

    fn cancel_rx_pair() -> (SessionHandle, oneshot::Receiver<CloseReason>) {
        let handle = SessionHandle::new();
        let rx = handle.take_cancel_rx().unwrap();
        (handle, rx)
    }

    #[tokio::test]
    async fn ping_echo_then_upstream_half_close() {
        let (near, mut far) = duplex(1024);
        let (channel, mut peer) = client_channel(8);
        let (_handle, cancel_rx) = cancel_rx_pair();
        let stats = SessionStats::new();

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            Arc::clone(&stats),
            cancel_rx,
            None,
        ));

        // Target: read the ping, echo it, close the write side.
        let target = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            far.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
            far.write_all(&buf).await.unwrap();
            far.shutdown().await.unwrap();
            far
        });

        peer.to_gateway.send(Bytes::from_static(b"ping")).await.unwrap();

        // Client observes the echoed bytes, then the half-close.
        assert_eq!(peer.from_gateway.recv().await.unwrap().as_ref(), b"ping");
        assert!(peer.from_gateway.recv().await.is_none());

        // Client closes its outbound direction; relay terminates normally.
        drop(peer.to_gateway);
        let reason = relay.await.unwrap();
        assert_eq!(reason, CloseReason::UpstreamClosed);
        assert!(!reason.is_error());
        let _ = target.await.unwrap();
    }

    #[tokio::test]
    async fn lossless_pipe_counters() {
        let (near, mut far) = duplex(4096);
        let (channel, mut peer) = client_channel(8);
        let (_handle, cancel_rx) = cancel_rx_pair();
        let stats = SessionStats::new();

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            Arc::clone(&stats),
            cancel_rx,
            None,
        ));

        let target = tokio::spawn(async move {
            // Echo everything until EOF, then close.
            let mut total = 0u64;
            let mut buf = [0u8; 512];
            loop {
                let n = far.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                far.write_all(&buf[..n]).await.unwrap();
                total += n as u64;
            }
            far.shutdown().await.unwrap();
            total
        });

        let mut sent = 0u64;
        for chunk in [&b"alpha"[..], &b"beta"[..], &b"gamma-delta"[..]] {
            peer.to_gateway.send(Bytes::copy_from_slice(chunk)).await.unwrap();
            sent += chunk.len() as u64;
        }
        drop(peer.to_gateway);

        let mut received = 0u64;
        while let Some(data) = peer.from_gateway.recv().await {
            received += data.len() as u64;
        }

        let reason = relay.await.unwrap();
        let echoed = target.await.unwrap();

        assert_eq!(reason, CloseReason::UpstreamClosed);
        assert_eq!(stats.bytes_to_target(), sent);
        assert_eq!(echoed, sent);
        assert_eq!(stats.bytes_to_client(), received);
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn cancel_unblocks_idle_relay() {
        let (near, _far) = duplex(64);
        let (channel, peer) = client_channel(8);
        let (handle, cancel_rx) = cancel_rx_pair();

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            SessionStats::new(),
            cancel_rx,
            None,
        ));

        // Nothing is flowing in either direction; cancel must still land.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(handle.cancel(CloseReason::Cancelled("caller".into())));

        let reason = relay.await.unwrap();
        assert_eq!(reason, CloseReason::Cancelled("caller".into()));
        drop(peer);
    }

    #[tokio::test]
    async fn cancel_unblocks_relay_stalled_on_client_send() {
        let (near, mut far) = duplex(64 * 1024);
        // Capacity 1 and a peer that never drains, so the relay stalls on
        // the second send.
        let (channel, peer) = client_channel(1);
        let (handle, cancel_rx) = cancel_rx_pair();

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            SessionStats::new(),
            cancel_rx,
            None,
        ));

        let flood = tokio::spawn(async move {
            let payload = vec![0x41u8; 256 * 1024];
            let _ = far.write_all(&payload).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(handle.cancel(CloseReason::Cancelled("operator".into())));

        let reason = tokio::time::timeout(std::time::Duration::from_millis(500), relay)
            .await
            .expect("relay must terminate promptly after cancel")
            .unwrap();
        assert_eq!(reason, CloseReason::Cancelled("operator".into()));
        drop(peer);
        let _ = flood.await;
    }

    #[tokio::test]
    async fn keepalive_stops_after_client_half_close() {
        let (near, mut far) = duplex(1024);
        let (channel, mut peer) = client_channel(8);
        let (_handle, cancel_rx) = cancel_rx_pair();
        let (keepalive_tx, keepalive_rx) = mpsc::channel(4);

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            SessionStats::new(),
            cancel_rx,
            Some(keepalive_rx),
        ));

        // Client half-closes straight away; the injector keeps ticking
        // until the relay drops its receiver.
        drop(peer.to_gateway);
        let injector = tokio::spawn(async move {
            while keepalive_tx
                .send(Bytes::from_static(b"\xff\xf1"))
                .await
                .is_ok()
            {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        });

        // The target answers well after the half-close; the response must
        // still reach the client.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        far.write_all(b"final").await.unwrap();
        far.shutdown().await.unwrap();

        assert_eq!(peer.from_gateway.recv().await.unwrap().as_ref(), b"final");
        assert!(peer.from_gateway.recv().await.is_none());

        let reason = relay.await.unwrap();
        assert_eq!(reason, CloseReason::UpstreamClosed);
        assert!(!reason.is_error());
        let _ = injector.await;
    }

    #[tokio::test]
    async fn keepalive_bypasses_counters() {
        let (near, mut far) = duplex(256);
        let (channel, peer) = client_channel(8);
        let (handle, cancel_rx) = cancel_rx_pair();
        let stats = SessionStats::new();
        let (keepalive_tx, keepalive_rx) = mpsc::channel(4);

        let relay = tokio::spawn(run_relay(
            Transport::from_stream(near),
            channel,
            Arc::clone(&stats),
            cancel_rx,
            Some(keepalive_rx),
        ));

        keepalive_tx.send(Bytes::from_static(b"\xff\xf1")).await.unwrap();

        let mut buf = [0u8; 2];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\xff\xf1");

        // Injected bytes are not relay traffic.
        assert_eq!(stats.bytes_to_target(), 0);

        handle.cancel(CloseReason::Cancelled("done".into()));
        relay.await.unwrap();
        drop(peer);
    }
}
