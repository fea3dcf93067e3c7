//! Transport abstraction over the target connection.
//!
//! Production sessions run over TCP; tests substitute in-memory duplex
//! pairs. Adapters only ever see [`Transport`], so they stay generic over
//! the underlying stream the way the rest of the codebase expects.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::classify::{classify_connect, classify_connect_timeout};
use crate::error::Result;

/// Object-safe duplex byte stream.
pub trait Duplex: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Duplex for T {}

/// One target-facing connection, owned exclusively by its session.
pub struct Transport {
    stream: Box<dyn Duplex>,
}

impl Transport {
    /// Open a TCP connection to `host:port` within `connect_timeout`.
    ///
    /// DNS failures, refusals, and timeouts all classify as
    /// `ConnectivityError`.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        debug!("connecting to {}:{} (timeout {:?})", host, port, connect_timeout);
        let stream = match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(classify_connect(host, port, &e)),
            Err(_) => return Err(classify_connect_timeout(host, port, connect_timeout)),
        };
        let _ = stream.set_nodelay(true);
        Ok(Self {
            stream: Box::new(stream),
        })
    }

    /// Wrap an already-open stream (tests, alternate transports).
    pub fn from_stream<S: Duplex + 'static>(stream: S) -> Self {
        Self {
            stream: Box::new(stream),
        }
    }

    /// Read whatever is available into `buf`, growing it as needed.
    /// Returns the number of bytes read; 0 means end-of-stream.
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        self.stream.read_buf(buf).await
    }

    /// Write and flush.
    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Shut down the write direction.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Split into independently owned read/write halves for the relay.
    pub fn into_split(self) -> (ReadHalf<Box<dyn Duplex>>, WriteHalf<Box<dyn Duplex>>) {
        tokio::io::split(self.stream)
    }
}
