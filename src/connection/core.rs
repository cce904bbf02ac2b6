//! Connection handle and application API.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, validate_interval};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::shutdown::ShutdownSignal;
use crate::transport::Transport;

use super::{heartbeat, loops};

// ============================================================================
// Shared
// ============================================================================

/// State shared between the handles and the background tasks.
///
/// Holds neither end of either buffer, so background tasks never keep the
/// handle side of the connection alive.
pub(super) struct Shared {
    /// Identifier used in log records.
    pub(super) id: ConnectionId,
    /// Constructor-time configuration.
    pub(super) config: ConnectionConfig,
    /// Exclusively owned transport.
    pub(super) transport: Box<dyn Transport>,
    /// Guards the single close transition.
    closed: Mutex<bool>,
    /// Fired after the transport is closed.
    pub(super) shutdown: ShutdownSignal,
}

impl Shared {
    /// Returns `true` once a close has begun.
    #[inline]
    pub(super) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Closes the transport and fires the shutdown signal, once.
    ///
    /// Callers that lose the race wait for the winner to fire the signal, so
    /// every caller returns with shutdown already visible.
    pub(super) async fn close(&self) {
        let already_closed = mem::replace(&mut *self.closed.lock(), true);
        if already_closed {
            self.shutdown.wait().await;
            return;
        }

        debug!(connection_id = %self.id, "Closing connection");

        match timeout(self.config.close_timeout, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %self.id, error = %e, "Transport close failed");
            }
            Err(_) => {
                warn!(
                    connection_id = %self.id,
                    timeout_ms = duration_ms(self.config.close_timeout),
                    "Transport close timed out"
                );
            }
        }

        self.shutdown.fire();
        debug!(connection_id = %self.id, "Connection closed");
    }

    /// Enqueues onto one of the buffers, waiting for space.
    ///
    /// The slot is reserved first and filled under the close lock, so nothing
    /// is enqueued once a close has begun.
    pub(super) async fn enqueue(
        &self,
        tx: &mpsc::Sender<Vec<u8>>,
        payload: Vec<u8>,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let permit = tokio::select! {
            biased;

            () = self.shutdown.wait() => return Err(Error::ConnectionClosed),

            permit = tx.reserve() => permit.map_err(|_| Error::ConnectionClosed)?,
        };

        let closed = self.closed.lock();
        if *closed {
            return Err(Error::ConnectionClosed);
        }
        permit.send(payload);
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// HandleState
// ============================================================================

/// Handle-side ends of the buffers.
///
/// Dropped with the last [`Connection`] clone. That closes the outbound
/// buffer, and the send loop then closes the connection.
struct HandleState {
    shared: Arc<Shared>,
    /// Producer side of the outbound buffer.
    outbound_tx: mpsc::Sender<Vec<u8>>,
    /// Consumer side of the inbound buffer.
    inbound_rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    /// Set once a heartbeat task has been started.
    heartbeat_started: AtomicBool,
    /// Runtime the background tasks are spawned on.
    runtime: Handle,
    /// Background task handles, drained by `Connection::shutdown`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HandleState {
    /// Dequeues from the inbound buffer, racing shutdown.
    async fn dequeue_inbound(&self) -> Result<Vec<u8>> {
        if self.shared.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        tokio::select! {
            biased;

            () = self.shared.shutdown.wait() => Err(Error::ConnectionClosed),

            payload = async { self.inbound_rx.lock().await.recv().await } => {
                payload.ok_or(Error::ConnectionClosed)
            }
        }
    }

    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(task);
        self.tasks.lock().push(handle);
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A buffered, backpressured duplex pipe over a [`Transport`].
///
/// Cloning is cheap; clones share the same connection. Dropping the last
/// clone closes the connection in the background. Call
/// [`shutdown`](Self::shutdown) to close it and wait for the teardown.
///
/// # Example
///
/// ```ignore
/// use duplex_pipe::{Connection, Result};
/// use duplex_pipe::transport::WsTransport;
///
/// async fn run(url: &str) -> Result<()> {
///     let connection = Connection::open(WsTransport::connect(url).await?)?;
///     connection.start_heartbeat()?;
///
///     connection.send_message(b"hello".to_vec()).await?;
///     let reply = connection.receive_message().await?;
///
///     connection.shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<HandleState>,
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Opens a connection with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open<T: Transport>(transport: T) -> Result<Self> {
        Self::open_with_config(transport, ConnectionConfig::default())
    }

    /// Opens a connection and starts its receive and send loops.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid
    /// - [`Error::InvalidState`] if the transport is not connected or no
    ///   tokio runtime is available
    pub fn open_with_config<T: Transport>(transport: T, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        if !transport.is_connected() {
            return Err(Error::invalid_state("transport is not connected"));
        }

        let runtime = Handle::try_current()
            .map_err(|_| Error::invalid_state("no tokio runtime available"))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        let shared = Arc::new(Shared {
            id: ConnectionId::generate(),
            config,
            transport: Box::new(transport),
            closed: Mutex::new(false),
            shutdown: ShutdownSignal::new(),
        });

        let inner = Arc::new(HandleState {
            shared: Arc::clone(&shared),
            outbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            heartbeat_started: AtomicBool::new(false),
            runtime,
            tasks: Mutex::new(Vec::with_capacity(3)),
        });

        inner.spawn_task(loops::receive_loop(Arc::clone(&shared), inbound_tx));
        inner.spawn_task(loops::send_loop(Arc::clone(&shared), outbound_rx));

        debug!(
            connection_id = %shared.id,
            inbound_capacity = shared.config.inbound_capacity,
            outbound_capacity = shared.config.outbound_capacity,
            "Connection opened"
        );

        Ok(Self { inner })
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.shared.id
    }

    /// Returns the configuration the connection was opened with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.shared.config
    }

    /// Returns `true` once a close has begun.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shared.is_closed()
    }

    /// Enqueues a payload for the transport.
    ///
    /// Suspends only while the outbound buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if a close has begun, or if
    /// shutdown fires while waiting for buffer space.
    pub async fn send_message(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        let inner = &self.inner;
        inner.shared.enqueue(&inner.outbound_tx, payload.into()).await
    }

    /// Waits for the next payload from the transport.
    ///
    /// Payloads are returned in the order the transport produced them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if a close has begun, or if
    /// shutdown fires while waiting.
    pub async fn receive_message(&self) -> Result<Vec<u8>> {
        self.inner.dequeue_inbound().await
    }

    /// Closes the connection.
    ///
    /// Idempotent and safe to call concurrently from any task. Exactly one
    /// caller closes the transport; every caller returns after the shutdown
    /// signal has fired.
    pub async fn close(&self) {
        self.inner.shared.close().await;
    }

    /// Completes once the connection has shut down.
    pub async fn closed(&self) {
        self.inner.shared.shutdown.wait().await;
    }

    /// Closes the connection and waits for every background task to return.
    ///
    /// Must not be called from within a task spawned by this connection.
    pub async fn shutdown(&self) {
        self.close().await;

        let tasks = mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(
                    connection_id = %self.inner.shared.id,
                    error = %e,
                    "Background task failed"
                );
            }
        }

        debug!(connection_id = %self.inner.shared.id, "Connection shut down");
    }

    /// Starts the heartbeat with the configured interval and payload.
    ///
    /// # Errors
    ///
    /// See [`start_heartbeat_with`](Self::start_heartbeat_with).
    pub fn start_heartbeat(&self) -> Result<()> {
        let config = &self.inner.shared.config;
        self.start_heartbeat_with(config.heartbeat_interval, config.heartbeat_payload.clone())
    }

    /// Starts a heartbeat task that enqueues `payload` every `interval`.
    ///
    /// The first heartbeat is sent immediately. The task stops for good once
    /// the connection closes.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `interval` is zero
    /// - [`Error::ConnectionClosed`] if the connection is already closed
    /// - [`Error::InvalidState`] if a heartbeat is already running
    pub fn start_heartbeat_with(
        &self,
        interval: Duration,
        payload: impl Into<Vec<u8>>,
    ) -> Result<()> {
        validate_interval(interval)?;

        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        if self.inner.heartbeat_started.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_state("heartbeat already running"));
        }

        debug!(
            connection_id = %self.inner.shared.id,
            interval_ms = duration_ms(interval),
            "Heartbeat started"
        );

        self.inner.spawn_task(heartbeat::run(
            Arc::clone(&self.inner.shared),
            self.inner.outbound_tx.downgrade(),
            interval,
            payload.into(),
        ));

        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.shared.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
