//! Heartbeat task.
//!
//! Enqueues a keepalive payload on the outbound path at a fixed interval.
//! The first tick fires immediately. Once the connection closes the task
//! returns and is never restarted.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use super::core::Shared;

// ============================================================================
// Task
// ============================================================================

/// Holds only a weak outbound sender, so a running heartbeat does not keep a
/// connection alive after its last handle is dropped.
pub(super) async fn run(
    shared: Arc<Shared>,
    outbound: mpsc::WeakSender<Vec<u8>>,
    period: Duration,
    payload: Vec<u8>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut beats: u64 = 0;

    loop {
        tokio::select! {
            biased;

            () = shared.shutdown.wait() => break,

            _ = ticker.tick() => {}
        }

        let Some(outbound_tx) = outbound.upgrade() else {
            break;
        };
        if shared.enqueue(&outbound_tx, payload.clone()).await.is_err() {
            break;
        }

        beats += 1;
        trace!(connection_id = %shared.id, beats, "Heartbeat enqueued");
    }

    debug!(connection_id = %shared.id, beats, "Heartbeat terminated");
}

// ============================================================================
// Tests
// ============================================================================
