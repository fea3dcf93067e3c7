//! Adapter registry: protocol identifier to adapter instance.
//!
//! Populated once at startup, then sealed. Lookup is lock-free via DashMap.
//! Adapters whose transport requirement the runtime cannot satisfy are
//! parked at registration by policy: they stay listable, but lookup yields
//! `TransportCapabilityMismatch` and no connection is ever attempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};

use crate::adapter::{AdapterDescriptor, ProtocolAdapter};
use crate::error::{GatewayError, Result};

pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn ProtocolAdapter>>,
    parked: DashMap<String, AdapterDescriptor>,
    sealed: AtomicBool,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
            parked: DashMap::new(),
            sealed: AtomicBool::new(false),
        }
    }

    /// Register an adapter under its descriptor's protocol identifier.
    ///
    /// Registrations after [`seal`](Self::seal) are ignored with a warning.
    pub fn register<A: ProtocolAdapter + 'static>(&self, adapter: A) {
        let descriptor = adapter.descriptor().clone();
        let protocol = descriptor.protocol.to_string();

        if self.sealed.load(Ordering::Acquire) {
            warn!("registry sealed, ignoring registration of {}", protocol);
            return;
        }

        if !descriptor.transport.is_available() {
            debug!(
                "parking {}: requires {} ({})",
                protocol,
                descriptor.transport.requirement(),
                descriptor.rfc
            );
            self.parked.insert(protocol, descriptor);
            return;
        }

        debug!("registering adapter {} ({})", protocol, descriptor.rfc);
        self.adapters.insert(protocol, Arc::new(adapter));
    }

    /// Resolve a protocol identifier to its adapter.
    pub fn lookup(&self, protocol: &str) -> Result<Arc<dyn ProtocolAdapter>> {
        if let Some(entry) = self.adapters.get(protocol) {
            return Ok(Arc::clone(entry.value()));
        }
        if let Some(parked) = self.parked.get(protocol) {
            return Err(GatewayError::TransportCapabilityMismatch(format!(
                "{} requires {}, which this runtime cannot provide",
                protocol,
                parked.transport.requirement()
            )));
        }
        Err(GatewayError::UnknownProtocol(protocol.to_string()))
    }

    /// Descriptor for a registered or parked protocol.
    pub fn descriptor(&self, protocol: &str) -> Option<AdapterDescriptor> {
        if let Some(entry) = self.adapters.get(protocol) {
            return Some(entry.value().descriptor().clone());
        }
        self.parked.get(protocol).map(|entry| entry.value().clone())
    }

    /// All known protocol identifiers, parked adapters included.
    pub fn list(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self
            .adapters
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.parked.iter().map(|entry| entry.key().clone()))
            .collect();
        protocols.sort();
        protocols
    }

    pub fn has(&self, protocol: &str) -> bool {
        self.adapters.contains_key(protocol) || self.parked.contains_key(protocol)
    }

    pub fn count(&self) -> usize {
        self.adapters.len() + self.parked.len()
    }

    /// Close the registry. The adapter set is immutable afterwards.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        debug!("registry sealed with {} adapters", self.count());
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
