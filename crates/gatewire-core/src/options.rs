//! Per-request connection options.
//!
//! Immutable once a session starts. Credential fields are opaque to the
//! gateway: they are forwarded verbatim to the client channel for
//! delegated-auth adapters and never parsed here.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

/// Caller-supplied configuration for one session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Opaque credential material, forwarded but never interpreted.
    pub credentials: HashMap<String, String>,
    /// Adapter-specific parameters (e.g. a finger query string).
    pub params: HashMap<String, String>,
    pub connect_timeout: Option<Duration>,
    pub handshake_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: HashMap::new(),
            params: HashMap::new(),
            connect_timeout: None,
            handshake_timeout: None,
            idle_timeout: None,
        }
    }

    pub fn credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The one-shot control message injected into a delegated-auth relay
    /// before any target byte is forwarded. This is the only
    /// protocol-aware message the gateway ever puts on the client channel.
    pub fn control_message(&self) -> Bytes {
        let message = json!({
            "type": "connection-options",
            "options": {
                "host": self.host,
                "port": self.port,
                "credentials": self.credentials,
                "params": self.params,
            },
        });
        Bytes::from(message.to_string())
    }
}
