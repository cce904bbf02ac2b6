//! Transport layer.
//!
//! A [`Transport`] is the raw, bidirectional message carrier underneath a
//! [`Connection`](crate::Connection). Handshake, framing and wire encoding
//! are entirely its responsibility; the connection only moves opaque byte
//! payloads through it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  send_message   ┌──────────┐  Send Loop     ┌───────────┐
//! │              │ ──────────────► │ outbound │ ─────────────► │           │
//! │ Application  │                 └──────────┘                │ Transport │
//! │              │ receive_message ┌──────────┐  Receive Loop  │           │
//! │              │ ◄────────────── │ inbound  │ ◄───────────── │           │
//! └──────────────┘                 └──────────┘                └───────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | [`WsTransport`] over `tokio-tungstenite` |
//! | `server` | [`WsServer`] accepting WebSocket clients |
//! | `memory` | [`MemoryTransport`] in-process pair |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport pair.
pub mod memory;

/// WebSocket server for accepting connections.
pub mod server;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryTransport;
pub use server::WsServer;
pub use websocket::{MessageKind, WsTransport};

// ============================================================================
// Transport
// ============================================================================

/// A duplex message transport.
///
/// Reads and writes are independent operations: the connection calls
/// [`receive`](Transport::receive) from one task and
/// [`send`](Transport::send) from another, concurrently, and may call
/// [`close`](Transport::close) from any task while either is in flight.
/// Implementations therefore take `&self` and synchronize internally.
///
/// Any error returned from `receive` or `send` is fatal: the connection
/// closes itself and never retries.
///
/// # Cancel Safety
///
/// [`receive`](Transport::receive) **must** be cancel-safe. The receive loop
/// races it against the shutdown signal and drops the future when shutdown
/// wins.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Receives the next complete payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the peer closed the stream or the read failed.
    async fn receive(&self) -> Result<Vec<u8>>;

    /// Sends one complete payload.
    ///
    /// # Errors
    ///
    /// Returns an error when the write failed or the transport is closed.
    async fn send(&self, payload: Vec<u8>) -> Result<()>;

    /// Closes the transport.
    ///
    /// Called at most once per connection.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller and otherwise ignored.
    async fn close(&self) -> Result<()>;

    /// Returns `false` if the transport can no longer carry messages.
    ///
    /// Checked once when the connection is opened.
    fn is_connected(&self) -> bool {
        true
    }
}
