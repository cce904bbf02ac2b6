//! Scriptable transport for unit tests.
//!
//! [`ScriptedTransport`] is driven from the test through a
//! [`TransportProbe`]: the probe feeds payloads and errors to `receive`,
//! records every `send`, counts `close` calls and can hold sends behind a
//! gate to fill the outbound buffer.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore, mpsc};
use tokio::time::{sleep, timeout};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownSignal;
use crate::transport::Transport;

// ============================================================================
// State
// ============================================================================

struct State {
    incoming: AsyncMutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    received: AtomicUsize,
    sent: Mutex<Vec<Vec<u8>>>,
    send_attempts: AtomicUsize,
    send_gate: Option<Semaphore>,
    fail_sends: AtomicBool,
    close_calls: AtomicUsize,
    hang_on_close: AtomicBool,
    closed: ShutdownSignal,
    connected: bool,
}

// ============================================================================
// ScriptedTransport
// ============================================================================

pub(crate) struct ScriptedTransport {
    state: Arc<State>,
}

impl ScriptedTransport {
    /// Connected transport; sends complete immediately.
    pub(crate) fn new() -> (Self, TransportProbe) {
        Self::build(None, true)
    }

    /// Connected transport; each send waits for a permit from
    /// [`TransportProbe::release_sends`].
    pub(crate) fn gated() -> (Self, TransportProbe) {
        Self::build(Some(Semaphore::new(0)), true)
    }

    /// Transport that reports itself as not connected.
    pub(crate) fn disconnected() -> (Self, TransportProbe) {
        Self::build(None, false)
    }

    fn build(send_gate: Option<Semaphore>, connected: bool) -> (Self, TransportProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(State {
            incoming: AsyncMutex::new(rx),
            received: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            send_gate,
            fail_sends: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            hang_on_close: AtomicBool::new(false),
            closed: ShutdownSignal::new(),
            connected,
        });

        let probe = TransportProbe {
            state: Arc::clone(&state),
            incoming: tx,
        };

        (Self { state }, probe)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn receive(&self) -> Result<Vec<u8>> {
        let state = &self.state;

        tokio::select! {
            biased;

            () = state.closed.wait() => Err(Error::transport("transport closed")),

            item = async { state.incoming.lock().await.recv().await } => match item {
                Some(Ok(payload)) => {
                    state.received.fetch_add(1, Ordering::SeqCst);
                    Ok(payload)
                }
                Some(Err(e)) => Err(e),
                None => Err(Error::transport("script ended")),
            },
        }
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let state = &self.state;
        state.send_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &state.send_gate {
            gate.acquire()
                .await
                .map_err(|_| Error::transport("send gate closed"))?
                .forget();
        }

        if state.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::transport("write failed"));
        }

        state.sent.lock().push(payload);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);

        if self.state.hang_on_close.load(Ordering::SeqCst) {
            pending::<()>().await;
        }

        self.state.closed.fire();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected
    }
}

// ============================================================================
// TransportProbe
// ============================================================================

#[derive(Clone)]
pub(crate) struct TransportProbe {
    state: Arc<State>,
    incoming: mpsc::UnboundedSender<Result<Vec<u8>>>,
}

impl TransportProbe {
    /// Queues a payload for `receive`.
    pub(crate) fn push(&self, payload: Vec<u8>) {
        let _ = self.incoming.send(Ok(payload));
    }

    /// Queues a receive error.
    pub(crate) fn fail_receive(&self, message: &str) {
        let _ = self.incoming.send(Err(Error::transport(message)));
    }

    /// Makes every later send fail.
    pub(crate) fn fail_sends(&self) {
        self.state.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Makes `close` never complete.
    pub(crate) fn hang_on_close(&self) {
        self.state.hang_on_close.store(true, Ordering::SeqCst);
    }

    /// Lets `n` gated sends through.
    pub(crate) fn release_sends(&self, n: usize) {
        if let Some(gate) = &self.state.send_gate {
            gate.add_permits(n);
        }
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.state.sent.lock().clone()
    }

    pub(crate) fn send_attempts(&self) -> usize {
        self.state.send_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn received(&self) -> usize {
        self.state.received.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_sent(&self, n: usize, within: Duration) -> Vec<Vec<u8>> {
        wait_until(within, || self.state.sent.lock().len() >= n).await;
        self.sent()
    }

    pub(crate) async fn wait_for_send_attempts(&self, n: usize, within: Duration) {
        wait_until(within, || self.send_attempts() >= n).await;
    }

    pub(crate) async fn wait_for_received(&self, n: usize, within: Duration) {
        wait_until(within, || self.received() >= n).await;
    }

    pub(crate) async fn wait_for_close_calls(&self, n: usize, within: Duration) {
        wait_until(within, || self.close_calls() >= n).await;
    }
}

async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) {
    timeout(within, async {
        while !condition() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
