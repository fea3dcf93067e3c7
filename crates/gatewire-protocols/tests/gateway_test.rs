//! End-to-end tests: the default adapter set driven through the broker
//! against miniature in-process protocol servers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gatewire_core::{
    client_channel, AdapterRegistry, BrokerConfig, CloseReason, ConnectOptions, ConnectionBroker,
    ErrorKind, SessionHandle,
};
use gatewire_protocols::register_defaults;

fn default_broker() -> ConnectionBroker {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = AdapterRegistry::new();
    register_defaults(&registry);
    registry.seal();
    ConnectionBroker::new(Arc::new(registry), BrokerConfig::default())
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn daytime_probe_end_to_end() {
    let (listener, port) = listen().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket
            .write_all(b"Tuesday, August 25, 2026 10:00:00-UTC\r\n")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let broker = default_broker();
    let outcome = broker
        .probe("daytime", ConnectOptions::new("127.0.0.1", port))
        .await;

    assert!(outcome.success, "error: {:?}", outcome.error);
    assert!(outcome.metadata["daytime"]
        .as_str()
        .unwrap()
        .contains("August 25"));
}

#[tokio::test]
async fn time_probe_end_to_end() {
    let (listener, port) = listen().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // 2026-08-25T00:00:00Z in RFC 868 seconds-since-1900.
        socket.write_all(&3_996_604_800u32.to_be_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let broker = default_broker();
    let outcome = broker
        .probe("time", ConnectOptions::new("127.0.0.1", port))
        .await;

    assert!(outcome.success, "error: {:?}", outcome.error);
    assert_eq!(
        outcome.metadata["unix_time"].as_i64().unwrap(),
        1_787_616_000
    );
}

#[tokio::test]
async fn echo_relay_end_to_end() {
    let (listener, port) = listen().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        socket.read_exact(&mut buf).await.unwrap();
        socket.write_all(&buf).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let broker = default_broker();
    let (channel, mut peer) = client_channel(8);
    let session = tokio::spawn(async move {
        broker
            .open(
                "echo",
                ConnectOptions::new("127.0.0.1", port),
                channel,
                SessionHandle::new(),
            )
            .await
    });

    peer.to_gateway.send(Bytes::from_static(b"hello")).await.unwrap();
    assert_eq!(peer.from_gateway.recv().await.unwrap().as_ref(), b"hello");
    assert!(peer.from_gateway.recv().await.is_none());
    drop(peer.to_gateway);

    let report = session.await.unwrap().unwrap();
    assert_eq!(report.close_reason, CloseReason::UpstreamClosed);
    assert_eq!(report.bytes_to_client, 5);
    assert_eq!(report.bytes_to_target, 5);
}

#[tokio::test]
async fn ssh_session_delivers_options_then_banner() {
    let (listener, port) = listen().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await.unwrap();
        // Stay connected until the gateway hangs up.
        let mut sink = [0u8; 64];
        let _ = socket.read(&mut sink).await;
    });

    let broker = default_broker();
    let (channel, mut peer) = client_channel(8);
    let handle = SessionHandle::new();
    let canceller = handle.clone();

    let options = ConnectOptions::new("127.0.0.1", port).credential("username", "alice");
    let session =
        tokio::spawn(async move { broker.open("ssh", options, channel, handle).await });

    let control: serde_json::Value =
        serde_json::from_slice(&peer.from_gateway.recv().await.unwrap()).unwrap();
    assert_eq!(control["type"], "connection-options");
    assert_eq!(control["options"]["port"], port);

    assert_eq!(
        peer.from_gateway.recv().await.unwrap().as_ref(),
        b"SSH-2.0-OpenSSH_9.6\r\n"
    );

    canceller.cancel(CloseReason::Cancelled("test finished".into()));
    let report = session.await.unwrap().unwrap();
    assert_eq!(report.bytes_to_client, 21);
}

#[tokio::test]
async fn parked_protocols_fail_fast_without_a_target() {
    let broker = default_broker();
    // No server anywhere; the capability check must reject first.
    for protocol in ["radius", "ntp"] {
        let outcome = broker
            .probe(protocol, ConnectOptions::new("203.0.113.1", 1812))
            .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.unwrap().kind,
            ErrorKind::TransportCapabilityMismatch
        );
    }
}

#[tokio::test]
async fn unknown_protocol_is_reported_as_such() {
    let broker = default_broker();
    let outcome = broker
        .probe("gopher", ConnectOptions::new("127.0.0.1", 70))
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::UnknownProtocol);
}

#[tokio::test]
async fn silent_sunrpc_target_times_out() {
    let (listener, port) = listen().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Swallow the call and say nothing.
        let mut sink = [0u8; 128];
        let _ = socket.read(&mut sink).await;
        let _ = socket.read(&mut sink).await;
    });

    let broker = default_broker();
    let outcome = broker
        .probe(
            "sunrpc",
            ConnectOptions::new("127.0.0.1", port)
                .with_handshake_timeout(Duration::from_millis(150)),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::HandshakeTimeout);
}
