//! Duplex connection pipe.
//!
//! A [`Connection`] owns a [`Transport`](crate::transport::Transport) and two
//! bounded buffers, and supervises the background tasks that move payloads
//! between them.
//!
//! # Tasks
//!
//! | Task | Role |
//! |------|------|
//! | Receive loop | transport → inbound buffer |
//! | Send loop | outbound buffer → transport |
//! | Heartbeat (optional) | periodic keepalive → outbound buffer |
//!
//! # Shutdown
//!
//! Any transport error, any explicit [`Connection::close`] and dropping the
//! last handle fire the connection's shutdown signal exactly once. Every task and every caller
//! blocked in [`Connection::send_message`] or
//! [`Connection::receive_message`] observes it and returns.
//!
//! Every race between a buffer operation and shutdown is resolved in favour
//! of shutdown:
//!
//! - payloads still in the inbound buffer are never handed to the
//!   application once shutdown has fired
//! - payloads still in the outbound buffer are never written to the
//!   transport once shutdown has fired
//!
//! Nothing is enqueued into either buffer once a close has begun, even while
//! the transport close itself is still pending.

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod heartbeat;
mod loops;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Connection;
