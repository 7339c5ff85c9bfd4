//! In-process transport.
//!
//! Used by the test suites of this crate and of its consumers.
//!
//! [`MemoryConnector`] hands out [`MemoryTransport`]s whose other ends
//! ([`ServerEnd`]) are delivered on an unbounded channel, so a test can
//! play the server: accept the handshake, push events, drop the
//! connection, and inspect what the client sent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::protocol::{decode, encode, Handshake, Packet};
use crate::transport::{ChannelError, Connector, Transport};

/// Hands out in-memory transports.
pub struct MemoryConnector {
    servers: mpsc::UnboundedSender<ServerEnd>,
    refuse: AtomicUsize,
    attempts: AtomicUsize,
    stall_close: AtomicBool,
}

impl MemoryConnector {
    /// Returns the connector plus the receiver on which every accepted
    /// connection's server end arrives.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        (
            Self {
                servers,
                refuse: AtomicUsize::new(0),
                attempts: AtomicUsize::new(0),
                stall_close: AtomicBool::new(false),
            },
            accepted,
        )
    }

    /// Fail the next `n` connection attempts.
    pub fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    /// Transports opened from now on never finish `close`.
    pub fn stall_close(&self) {
        self.stall_close.store(true, Ordering::SeqCst);
    }

    /// Total connection attempts so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChannelError::Connection("connection refused".into()));
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        self.servers
            .send(ServerEnd {
                tx: to_client,
                rx: from_client,
            })
            .map_err(|_| ChannelError::Connection("no server listening".into()))?;

        Ok(Box::new(MemoryTransport {
            tx: Some(to_server),
            rx: from_server,
            stall_close: self.stall_close.load(Ordering::SeqCst),
        }))
    }

    fn endpoint(&self) -> &str {
        "memory"
    }
}

/// Client half of an in-memory connection.
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
    stall_close: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, frame: String) -> Result<(), ChannelError> {
        let tx = self.tx.as_ref().ok_or(ChannelError::Closed)?;
        tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        self.tx = None;
        self.rx.close();
    }
}

/// Server half of an in-memory connection.
///
/// Dropping it closes the connection from the server side.
pub struct ServerEnd {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    /// Handshake parameters used by [`accept`](Self::accept).
    pub fn handshake() -> Handshake {
        Handshake {
            sid: "memory-sid".into(),
            upgrades: Vec::new(),
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        }
    }

    /// Run the server side of the Engine.IO / Socket.IO handshake: send
    /// `open`, wait for the namespace connect, acknowledge it.
    pub async fn accept(&mut self) -> Result<(), ChannelError> {
        self.send(Packet::Open(Self::handshake()));
        match self.recv().await {
            Some(Packet::Connect(_)) => {
                self.send(Packet::Connect(Some(serde_json::json!({"sid": "memory-nsp"}))));
                Ok(())
            }
            Some(other) => Err(ChannelError::Protocol(format!(
                "expected namespace connect, got {other:?}"
            ))),
            None => Err(ChannelError::Closed),
        }
    }

    /// Send a packet to the client. Errors are ignored (client gone).
    pub fn send(&self, packet: Packet) {
        if let Ok(frame) = encode(&packet) {
            let _ = self.tx.send(frame);
        }
    }

    /// Send a raw frame, bypassing the codec.
    pub fn send_raw(&self, frame: &str) {
        let _ = self.tx.send(frame.to_string());
    }

    /// Push a named event into the client.
    pub fn push(&self, name: &str, data: Value) {
        self.send(Packet::event(name, data));
    }

    /// Next packet sent by the client; `None` once the client closed.
    /// Frames that fail to decode are skipped.
    pub async fn recv(&mut self) -> Option<Packet> {
        loop {
            let frame = self.rx.recv().await?;
            match decode(&frame) {
                Ok(packet) => return Some(packet),
                Err(e) => tracing::warn!(error = %e, raw_frame = %frame, "Client sent a bad frame"),
            }
        }
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Packet> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}
