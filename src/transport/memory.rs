//! In-process transport pair.
//!
//! [`MemoryTransport::pair`] returns two endpoints wired back to back through
//! bounded tokio channels. Closing one endpoint makes the peer's next
//! `receive` fail, which is how a real socket reports a remote hang-up.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::trace;

use crate::error::{Error, Result};
use crate::shutdown::ShutdownSignal;

use super::Transport;

// ============================================================================
// MemoryTransport
// ============================================================================

/// One end of an in-process duplex pipe.
#[derive(Debug)]
pub struct MemoryTransport {
    /// Writer towards the peer. Taken on close.
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    /// Reader from the peer.
    rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    /// Local close.
    closed: ShutdownSignal,
}

impl MemoryTransport {
    /// Creates two connected endpoints.
    ///
    /// `capacity` bounds the number of in-flight payloads per direction.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);

        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
            closed: ShutdownSignal::new(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&self) -> Result<Vec<u8>> {
        tokio::select! {
            biased;

            () = self.closed.wait() => Err(Error::transport("transport closed")),

            payload = async { self.rx.lock().await.recv().await } => {
                payload.ok_or_else(|| Error::transport("closed by peer"))
            }
        }
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or_else(|| Error::transport("transport closed"))?;

        trace!(len = payload.len(), "Memory transport send");

        tokio::select! {
            biased;

            () = self.closed.wait() => Err(Error::transport("transport closed")),

            result = tx.send(payload) => result.map_err(|_| Error::transport("closed by peer")),
        }
    }

    async fn close(&self) -> Result<()> {
        self.tx.lock().take();
        self.closed.fire();
        // Fail the peer's pending and future sends.
        self.rx.lock().await.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.is_fired()
    }
}

// ============================================================================
// Tests
// ============================================================================
