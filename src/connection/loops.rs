//! Receive and send loops.
//!
//! Both loops exit as soon as they observe the shutdown signal. A transport
//! error in either loop closes the whole connection; nothing is retried.
//! Once every handle is dropped, whichever loop notices first closes the
//! connection as well.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::core::Shared;

// ============================================================================
// Receive Loop
// ============================================================================

/// Moves payloads from the transport into the inbound buffer.
///
/// Sole producer of the inbound buffer. Dropping `inbound_tx` on exit makes
/// any pending `receive_message` fail. If every handle is gone the inbound
/// buffer is closed and the loop closes the connection.
pub(super) async fn receive_loop(shared: Arc<Shared>, inbound_tx: mpsc::Sender<Vec<u8>>) {
    loop {
        let received = tokio::select! {
            biased;

            () = shared.shutdown.wait() => break,

            received = shared.transport.receive() => received,
        };

        let payload = match received {
            Ok(payload) => payload,
            Err(e) => {
                debug!(connection_id = %shared.id, error = %e, "Transport receive failed");
                shared.close().await;
                break;
            }
        };

        trace!(connection_id = %shared.id, len = payload.len(), "Payload received");

        if shared.enqueue(&inbound_tx, payload).await.is_err() {
            trace!(connection_id = %shared.id, "Discarding payload after close");
            shared.close().await;
            break;
        }
    }

    debug!(connection_id = %shared.id, "Receive loop terminated");
}

// ============================================================================
// Send Loop
// ============================================================================

/// Moves payloads from the outbound buffer to the transport.
///
/// Sole consumer of the outbound buffer. Payloads still buffered when
/// shutdown fires are dropped without being written, and a write still in
/// flight is abandoned.
pub(super) async fn send_loop(shared: Arc<Shared>, mut outbound_rx: mpsc::Receiver<Vec<u8>>) {
    loop {
        let payload = tokio::select! {
            biased;

            () = shared.shutdown.wait() => break,

            payload = outbound_rx.recv() => match payload {
                Some(payload) => payload,
                None => {
                    debug!(connection_id = %shared.id, "All handles dropped");
                    shared.close().await;
                    break;
                }
            },
        };

        if shared.is_closed() {
            break;
        }

        let len = payload.len();
        let sent = tokio::select! {
            biased;

            () = shared.shutdown.wait() => {
                trace!(connection_id = %shared.id, len, "Abandoning in-flight write on shutdown");
                break;
            }

            sent = shared.transport.send(payload) => sent,
        };

        if let Err(e) = sent {
            debug!(connection_id = %shared.id, error = %e, "Transport send failed");
            shared.close().await;
            break;
        }

        trace!(connection_id = %shared.id, len, "Payload sent");
    }

    // Refuse further enqueues and release anything still buffered.
    outbound_rx.close();
    let dropped = std::iter::from_fn(|| outbound_rx.try_recv().ok()).count();
    if dropped > 0 {
        debug!(connection_id = %shared.id, dropped, "Dropped undelivered payloads");
    }

    debug!(connection_id = %shared.id, "Send loop terminated");
}
