//! DNS server: binds UDP and TCP listeners using hickory-server.

use crate::config::DnsServerConfig;
use anyhow::Context;
use hickory_server::server::RequestHandler;
use hickory_server::ServerFuture;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;

/// The Zonefold DNS server.
///
/// Wraps hickory-server's ServerFuture around any request handler,
/// normally a [`crate::ZoneHandler`].
pub struct DnsServer;

impl DnsServer {
    /// Start the DNS server.
    ///
    /// Binds UDP and TCP on the configured address and serves queries
    /// until the runtime shuts down or the future is dropped.
    pub async fn start<H: RequestHandler>(config: &DnsServerConfig, handler: H) -> anyhow::Result<()> {
        let udp_socket = UdpSocket::bind(config.bind_addr)
            .await
            .with_context(|| format!("binding UDP {}", config.bind_addr))?;
        let tcp_listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("binding TCP {}", config.bind_addr))?;

        info!(addr = %config.bind_addr, "DNS server listening (UDP + TCP)");
        Self::serve(udp_socket, tcp_listener, handler, config.tcp_timeout).await
    }

    /// Serve on already-bound sockets
    pub async fn serve<H: RequestHandler>(
        udp_socket: UdpSocket,
        tcp_listener: TcpListener,
        handler: H,
        tcp_timeout: Duration,
    ) -> anyhow::Result<()> {
        let mut server = ServerFuture::new(handler);
        server.register_socket(udp_socket);
        server.register_listener(tcp_listener, tcp_timeout);

        // Run until shutdown
        server.block_until_done().await?;

        info!("DNS server stopped");
        Ok(())
    }
}
