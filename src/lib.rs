//! Duplex Pipe - buffered, backpressured message connections.
//!
//! This library turns a raw bidirectional message transport (typically a
//! WebSocket) into a connection an application loop can consume safely.
//!
//! # Architecture
//!
//! Each [`Connection`] owns:
//!
//! - One [`Transport`](transport::Transport), closed exactly once
//! - Two bounded FIFO buffers (inbound, outbound)
//! - A receive loop and a send loop running as tokio tasks
//! - An optional heartbeat task
//!
//! Any transport fault or explicit [`Connection::close`] fires a one-shot
//! [`ShutdownSignal`] that releases every task and every blocked caller.
//! Transport faults surface to the application only as
//! [`Error::ConnectionClosed`]; reconnecting means opening a new
//! connection over a new transport.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! use duplex_pipe::Result;
//! use duplex_pipe::transport::WsServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = WsServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 8866).await?;
//!
//!     let connection = server.accept().await?;
//!     connection.start_heartbeat()?;
//!
//!     while let Ok(payload) = connection.receive_message().await {
//!         connection.send_message(payload).await?;
//!     }
//!
//!     connection.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`ConnectionConfig`] and defaults |
//! | [`connection`] | [`Connection`] and its background tasks |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`shutdown`] | One-shot [`ShutdownSignal`] |
//! | [`transport`] | Transport trait and WebSocket / in-memory implementations |

// ============================================================================
// Modules
// ============================================================================

/// Connection configuration.
pub mod config;

/// Duplex connection pipe.
///
/// [`Connection`] exposes `send_message`, `receive_message`, `close` and
/// `start_heartbeat` to the application.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// One-shot shutdown broadcast.
pub mod shutdown;

/// Transport layer.
///
/// The [`Transport`](transport::Transport) trait plus WebSocket and in-memory
/// implementations.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::ConnectionConfig;

// Connection
pub use connection::Connection;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Shutdown
pub use shutdown::ShutdownSignal;

// Transport types
pub use transport::{MemoryTransport, MessageKind, Transport, WsServer, WsTransport};
