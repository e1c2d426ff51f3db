//! DNS server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port; unprivileged so the server runs without root
pub const DEFAULT_PORT: u16 = 5353;

/// DNS server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsServerConfig {
    /// Address to bind both the UDP socket and the TCP listener to
    pub bind_addr: SocketAddr,

    /// Idle timeout for TCP connections
    pub tcp_timeout: Duration,
}

impl Default for DnsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            tcp_timeout: Duration::from_secs(10),
        }
    }
}

impl DnsServerConfig {
    /// Create a config bound to `bind_addr`
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Set the TCP idle timeout
    pub fn with_tcp_timeout(mut self, timeout: Duration) -> Self {
        self.tcp_timeout = timeout;
        self
    }
}
