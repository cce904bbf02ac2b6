//! Echo server demo.
//!
//! Accepts WebSocket clients, starts a heartbeat on each connection and
//! echoes every payload back until the client goes away.
//!
//! Usage: cargo run --example echo_server -- [--debug] [--port 8866]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use duplex_pipe::{Connection, ConnectionConfig, Result, WsServer};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound on a client's WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    port: u16,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let port = args
            .iter()
            .position(|a| a == "--port")
            .and_then(|i| args.get(i + 1))
            .and_then(|p| p.parse().ok())
            .unwrap_or(8866);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            port,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "duplex_pipe=debug,echo_server=debug"
    } else {
        "duplex_pipe=info,echo_server=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Upgrades an accepted client and serves it.
async fn serve(stream: TcpStream, peer: SocketAddr, config: ConnectionConfig) {
    let transport = match timeout(HANDSHAKE_TIMEOUT, WsServer::upgrade(stream)).await {
        Ok(Ok(transport)) => transport,
        Ok(Err(e)) => {
            warn!(%peer, error = %e, "Handshake failed");
            return;
        }
        Err(_) => {
            warn!(%peer, "Handshake timed out");
            return;
        }
    };

    match Connection::open_with_config(transport, config) {
        Ok(connection) => {
            info!(%peer, connection_id = %connection.id(), "Client connected");
            echo(connection).await;
        }
        Err(e) => warn!(%peer, error = %e, "Failed to open connection"),
    }
}

/// Echoes payloads until the connection closes.
async fn echo(connection: Connection) {
    if let Err(e) = connection.start_heartbeat() {
        warn!(error = %e, "Failed to start heartbeat");
    }

    loop {
        let payload = match connection.receive_message().await {
            Ok(payload) => payload,
            Err(_) => break,
        };

        if connection.send_message(payload).await.is_err() {
            break;
        }
    }

    connection.shutdown().await;
    info!(connection_id = %connection.id(), "Client disconnected");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let server = WsServer::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port).await?;
    info!(url = %server.ws_url(), "Echo server listening");

    loop {
        tokio::select! {
            accepted = server.accept_stream() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve(stream, peer, server.config().clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
