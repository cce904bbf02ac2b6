//! WebSocket transport.
//!
//! [`WsTransport`] adapts a `tokio_tungstenite::WebSocketStream` to the
//! [`Transport`] trait. The stream is split so reads and writes proceed
//! independently; each half sits behind its own async mutex.
//!
//! Text and binary frames are both delivered as raw bytes. Ping, pong and raw
//! frames are skipped. A close frame from the peer is reported as a transport
//! error, which tears the owning connection down.
//!
//! `close` never queues behind a write. It cancels a write in flight, and if
//! one was in flight the close handshake is skipped, because a close frame
//! cannot follow a partially written frame. The socket itself is released
//! when the transport is dropped.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::shutdown::ShutdownSignal;

use super::Transport;

// ============================================================================
// MessageKind
// ============================================================================

/// Frame type used for outgoing payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    /// Binary frames. Any payload is accepted.
    #[default]
    Binary,
    /// Text frames. Payloads must be valid UTF-8.
    Text,
}

// ============================================================================
// WsTransport
// ============================================================================

/// [`Transport`] over a WebSocket stream.
pub struct WsTransport<S> {
    /// Write half.
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    /// Read half.
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
    /// Frame type for `send`.
    kind: MessageKind,
    /// Fired by `close`; cancels writes in flight.
    closing: ShutdownSignal,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an established WebSocket stream.
    #[must_use]
    pub fn new(ws_stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws_stream.split();

        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            kind: MessageKind::default(),
            closing: ShutdownSignal::new(),
        }
    }

    /// Sets the frame type used for outgoing payloads.
    #[inline]
    #[must_use]
    pub fn with_message_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the frame type used for outgoing payloads.
    #[inline]
    #[must_use]
    pub fn message_kind(&self) -> MessageKind {
        self.kind
    }

    fn encode(&self, payload: Vec<u8>) -> Result<Message> {
        match self.kind {
            MessageKind::Binary => Ok(Message::binary(payload)),
            MessageKind::Text => String::from_utf8(payload)
                .map(Message::text)
                .map_err(|e| Error::transport(format!("payload is not valid UTF-8: {e}"))),
        }
    }
}

impl WsTransport<MaybeTlsStream<TcpStream>> {
    /// Dials a WebSocket server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the TCP connect or the upgrade fails.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, response) = connect_async(url).await?;

        debug!(url, status = %response.status(), "WebSocket client connected");

        Ok(Self::new(ws_stream))
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&self) -> Result<Vec<u8>> {
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                    return Ok(message.into_data().to_vec());
                }

                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return Err(Error::transport("closed by peer"));
                }

                Some(Err(e)) => return Err(e.into()),

                None => return Err(Error::transport("WebSocket stream ended")),

                // Ignore Ping, Pong, Frame
                Some(Ok(_)) => {}
            }
        }
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let message = self.encode(payload)?;

        tokio::select! {
            biased;

            () = self.closing.wait() => Err(Error::transport("transport closed")),

            sent = async { self.sink.lock().await.send(message).await } => {
                sent?;
                trace!("WebSocket frame sent");
                Ok(())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closing.fire() {
            return Ok(());
        }

        let Ok(mut sink) = self.sink.try_lock() else {
            debug!("Write in flight, skipping WebSocket close handshake");
            return Ok(());
        };

        match sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_connected(&self) -> bool {
        !self.closing.is_fired()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::duplex;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::protocol::Role;

    const WAIT: Duration = Duration::from_secs(2);

    async fn ws_pair() -> (
        WsTransport<tokio::io::DuplexStream>,
        WsTransport<tokio::io::DuplexStream>,
    ) {
        let (client_io, server_io) = duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        (WsTransport::new(client), WsTransport::new(server))
    }

    #[tokio::test]
    async fn test_binary_round_trip() {
        let (client, server) = ws_pair().await;

        client.send(vec![0, 159, 146, 150]).await.expect("send");
        assert_eq!(server.receive().await.expect("receive"), vec![0, 159, 146, 150]);
    }

    #[tokio::test]
    async fn test_text_kind_rejects_invalid_utf8() {
        let (client, _server) = ws_pair().await;
        let client = client.with_message_kind(MessageKind::Text);

        assert_eq!(client.message_kind(), MessageKind::Text);
        let err = client.send(vec![0xff, 0xfe]).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_text_frames_arrive_as_bytes() {
        let (client, server) = ws_pair().await;
        let client = client.with_message_kind(MessageKind::Text);

        client.send(b"heartbeat".to_vec()).await.expect("send");
        assert_eq!(server.receive().await.expect("receive"), b"heartbeat");
    }

    #[tokio::test]
    async fn test_close_reaches_peer_as_error() {
        let (client, server) = ws_pair().await;

        client.close().await.expect("close");
        assert!(!client.is_connected());
        assert!(server.receive().await.is_err());

        // Second close is a no-op.
        client.close().await.expect("second close");
    }

    #[tokio::test]
    async fn test_close_not_blocked_by_stalled_write() {
        // The peer end is kept alive but never read, so the write parks.
        let (client_io, _server_io) = duplex(64);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let client = Arc::new(WsTransport::new(client));

        let writer = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.send(vec![7; 64 * 1024]).await }
        });

        timeout(WAIT, async {
            while client.sink.try_lock().is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("write parks on the full pipe");

        timeout(Duration::from_millis(500), client.close())
            .await
            .expect("close does not wait for the stalled write")
            .expect("close");
        assert!(!client.is_connected());

        let result = timeout(WAIT, writer)
            .await
            .expect("writer released")
            .expect("writer task");
        assert!(matches!(result, Err(Error::Transport { .. })));
    }
}
