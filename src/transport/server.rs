//! WebSocket server for accepting connections.
//!
//! Process bootstrap lives outside the connection core; this module is the
//! thin piece that produces a transport and hands it over.
//!
//! # Connection Flow
//!
//! 1. `WsServer::bind` binds a TCP listener (port 0 for random)
//! 2. Client dials `ws_url()`
//! 3. `WsServer::accept` accepts the TCP stream and performs the upgrade.
//!    Servers that must not stall on a slow handshake call
//!    `accept_stream` and run `WsServer::upgrade` on a spawned task instead.
//! 4. The upgraded stream is wrapped in a [`WsTransport`] and opened as a
//!    [`Connection`]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};

use super::WsTransport;

// ============================================================================
// WsServer
// ============================================================================

/// A bound WebSocket server.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use duplex_pipe::transport::WsServer;
///
/// let server = WsServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("listening on {}", server.ws_url());
///
/// loop {
///     let connection = server.accept().await?;
///     tokio::spawn(handle(connection));
/// }
/// ```
pub struct WsServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the server is bound to.
    local_addr: SocketAddr,
    /// Configuration for accepted connections.
    config: ConnectionConfig,
}

impl WsServer {
    /// Binds a server to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "WebSocket server bound");

        Ok(Self {
            listener,
            local_addr,
            config: ConnectionConfig::default(),
        })
    }

    /// Sets the configuration used for every accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(mut self, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the configuration used for accepted connections.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Accepts one TCP client without performing the upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the TCP accept fails.
    pub async fn accept_stream(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        debug!(%peer, "TCP connection accepted");
        Ok((stream, peer))
    }

    /// Performs the server side of the WebSocket upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the upgrade fails.
    pub async fn upgrade(stream: TcpStream) -> Result<WsTransport<TcpStream>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        Ok(WsTransport::new(ws_stream))
    }

    /// Accepts one client and performs the WebSocket upgrade.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the TCP accept fails
    /// - [`Error::WebSocket`] if the upgrade fails
    pub async fn accept_transport(&self) -> Result<(WsTransport<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.accept_stream().await?;
        let transport = Self::upgrade(stream).await?;
        info!(%peer, "WebSocket connection established");

        Ok((transport, peer))
    }

    /// Accepts one client and opens a [`Connection`] over it.
    ///
    /// # Errors
    ///
    /// Same as [`accept_transport`](Self::accept_transport), plus any error
    /// from [`Connection::open_with_config`].
    pub async fn accept(&self) -> Result<Connection> {
        let (transport, _) = self.accept_transport().await?;
        Connection::open_with_config(transport, self.config.clone())
    }

    /// Like [`accept`](Self::accept), bounded by `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if no client completes the
    /// upgrade in time.
    pub async fn accept_within(&self, wait: Duration) -> Result<Connection> {
        timeout(wait, self.accept())
            .await
            .map_err(|_| {
                Error::connection_timeout(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
            })?
    }
}

// ============================================================================
// Tests
// ============================================================================
