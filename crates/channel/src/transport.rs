//! Transport abstraction for the push channel.
//!
//! A [`Connector`] knows how to open a fresh [`Transport`], a
//! bidirectional stream of text frames. [`WsConnector`] is the production
//! implementation over `tokio-tungstenite`; [`crate::memory`] provides an
//! in-process pair for tests.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Opens new transport connections to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, ChannelError>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> &str;
}

/// A live, bidirectional text-frame connection.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError>;

    /// Next text frame. `None` once the peer has closed the connection.
    async fn recv(&mut self) -> Option<Result<String, ChannelError>>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Connects to a Socket.IO server over its WebSocket transport.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// * `base_url` - server origin, e.g. `ws://host:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            url: format!(
                "{}/socket.io/?EIO=4&transport=websocket",
                base_url.trim_end_matches('/')
            ),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ChannelError> {
        let (stream, _response) = connect_async(&self.url).await.map_err(|e| {
            ChannelError::Connection(format!("Failed to connect to {}: {e}", self.url))
        })?;
        tracing::debug!(url = %self.url, "WebSocket transport opened");
        Ok(Box::new(WsTransport {
            stream,
            closed: false,
        }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(|e| ChannelError::Protocol(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        while let Some(msg_result) = self.stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(_)) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(ChannelError::Protocol(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}

/// Errors raised by the channel layer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the transport connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A transport- or protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused the namespace connect.
    #[error("Connect rejected by server: {0}")]
    Rejected(String),

    /// The handshake did not complete in time.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// The connection closed underneath an operation.
    #[error("Connection closed")]
    Closed,
}

impl From<crate::protocol::ProtocolError> for ChannelError {
    fn from(e: crate::protocol::ProtocolError) -> Self {
        ChannelError::Protocol(e.to_string())
    }
}
