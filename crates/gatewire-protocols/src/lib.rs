//! Protocol adapters for the gatewire gateway.
//!
//! Adapters fall into four behavioral classes:
//! - pure relays with no handshake (echo, discard, telnet),
//! - probe-only exchanges that finish inside the handshake (daytime,
//!   chargen, time, finger),
//! - delegated-auth relays that forward connection options to the client
//!   (ssh),
//! - structured binary probes over a framing codec (sunrpc, dns).
//!
//! Adapters whose transport the runtime cannot provide (radius, ntp,
//! rlogin, ftps) register their descriptors anyway; the registry parks
//! them so lookups report the capability gap instead of "unknown".

pub mod chargen;
pub mod daytime;
pub mod discard;
pub mod dns;
pub mod echo;
pub mod finger;
pub mod parked;
pub mod ssh;
pub mod sunrpc;
pub mod telnet;
pub mod time;

pub use chargen::ChargenAdapter;
pub use daytime::DaytimeAdapter;
pub use discard::DiscardAdapter;
pub use dns::DnsAdapter;
pub use echo::EchoAdapter;
pub use finger::FingerAdapter;
pub use parked::{FtpsAdapter, NtpAdapter, RadiusAdapter, RloginAdapter};
pub use ssh::SshAdapter;
pub use sunrpc::SunRpcAdapter;
pub use telnet::TelnetAdapter;
pub use time::TimeAdapter;

use gatewire_core::AdapterRegistry;

/// Register the full adapter set. The caller seals the registry once all
/// registrations (including any of its own) are done.
pub fn register_defaults(registry: &AdapterRegistry) {
    registry.register(EchoAdapter::new());
    registry.register(DiscardAdapter::new());
    registry.register(DaytimeAdapter::new());
    registry.register(ChargenAdapter::new());
    registry.register(TimeAdapter::new());
    registry.register(FingerAdapter::new());
    registry.register(TelnetAdapter::new());
    registry.register(SshAdapter::new());
    registry.register(SunRpcAdapter::new());
    registry.register(DnsAdapter::new());
    registry.register(RadiusAdapter::new());
    registry.register(NtpAdapter::new());
    registry.register(RloginAdapter::new());
    registry.register(FtpsAdapter::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_registers_every_protocol() {
        let registry = AdapterRegistry::new();
        register_defaults(&registry);
        registry.seal();

        let listed = registry.list();
        for protocol in [
            "chargen", "daytime", "discard", "dns", "echo", "finger", "ftps", "ntp", "radius",
            "rlogin", "ssh", "sunrpc", "telnet", "time",
        ] {
            assert!(listed.contains(&protocol.to_string()), "missing {protocol}");
        }
        assert_eq!(registry.count(), 14);
    }
}
