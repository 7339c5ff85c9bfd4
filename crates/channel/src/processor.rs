//! Frame processing for one live connection.
//!
//! [`open_session`] drives the Engine.IO / Socket.IO handshake on a fresh
//! transport. [`process_frames`] then reads frames until the connection
//! ends, answering heartbeats and turning `event` packets into
//! [`ServerEvent`]s dispatched through the [`EventRouter`].

use std::time::Duration;

use resumatch_events::messages::EventDecodeError;
use resumatch_events::{EventRouter, ServerEvent};
use tokio_util::sync::CancellationToken;

use crate::protocol::{decode, encode, Handshake, Packet};
use crate::transport::{ChannelError, Transport};

/// How long the server gets to complete the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Why [`process_frames`] stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The owner cancelled the connection.
    Cancelled,
    /// The server disconnected the namespace on purpose; do not reconnect.
    Kicked,
    /// The transport dropped; reconnect.
    Dropped(String),
}

/// Send one packet on the transport.
pub async fn send_packet(
    transport: &mut dyn Transport,
    packet: &Packet,
) -> Result<(), ChannelError> {
    transport.send(encode(packet)?).await
}

/// Complete the handshake on a freshly opened transport.
///
/// Waits for the Engine.IO `open` packet, requests the default namespace
/// and waits for its acknowledgement, all within [`HANDSHAKE_TIMEOUT`].
pub async fn open_session(transport: &mut dyn Transport) -> Result<Handshake, ChannelError> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(transport))
        .await
        .map_err(|_| ChannelError::HandshakeTimeout)?
}

async fn handshake(transport: &mut dyn Transport) -> Result<Handshake, ChannelError> {
    let handshake = match next_packet(transport).await? {
        Packet::Open(handshake) => handshake,
        other => {
            return Err(ChannelError::Protocol(format!(
                "expected open packet, got {other:?}"
            )))
        }
    };
    tracing::debug!(sid = %handshake.sid, "Engine.IO session opened");

    send_packet(transport, &Packet::Connect(None)).await?;

    loop {
        match next_packet(transport).await? {
            Packet::Connect(_) => return Ok(handshake),
            Packet::Ping => send_packet(transport, &Packet::Pong).await?,
            Packet::ConnectError(body) => {
                let reason = body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| body.to_string());
                return Err(ChannelError::Rejected(reason));
            }
            Packet::Close => return Err(ChannelError::Closed),
            other => {
                tracing::debug!(?other, "Ignoring packet during handshake");
            }
        }
    }
}

async fn next_packet(transport: &mut dyn Transport) -> Result<Packet, ChannelError> {
    match transport.recv().await {
        Some(Ok(frame)) => Ok(decode(&frame)?),
        Some(Err(e)) => Err(e),
        None => Err(ChannelError::Closed),
    }
}

/// Process frames until the connection ends.
///
/// A connection that stays silent for longer than `liveness` (the server
/// pings at a fixed interval) is treated as dropped.
pub async fn process_frames(
    transport: &mut dyn Transport,
    router: &EventRouter,
    liveness: Duration,
    cancel: &CancellationToken,
) -> SessionEnd {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            next = tokio::time::timeout(liveness, transport.recv()) => next,
        };

        let frame = match next {
            Err(_) => return SessionEnd::Dropped("heartbeat timeout".into()),
            Ok(None) => return SessionEnd::Dropped("closed by server".into()),
            Ok(Some(Err(e))) => {
                tracing::error!(error = %e, "Push channel receive error");
                return SessionEnd::Dropped(e.to_string());
            }
            Ok(Some(Ok(frame))) => frame,
        };

        if let Some(end) = handle_frame(transport, router, &frame).await {
            return end;
        }
    }
}

/// Handle one text frame. Returns `Some` when the session is over.
async fn handle_frame(
    transport: &mut dyn Transport,
    router: &EventRouter,
    frame: &str,
) -> Option<SessionEnd> {
    let packet = match decode(frame) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(error = %e, raw_frame = %frame, "Failed to decode frame");
            return None;
        }
    };

    match packet {
        Packet::Ping => {
            if let Err(e) = send_packet(transport, &Packet::Pong).await {
                return Some(SessionEnd::Dropped(e.to_string()));
            }
        }
        Packet::Event { name, data } => dispatch_event(router, &name, data),
        Packet::Close => return Some(SessionEnd::Dropped("transport close".into())),
        Packet::Disconnect => {
            tracing::warn!("Server disconnected the namespace");
            return Some(SessionEnd::Kicked);
        }
        Packet::ConnectError(body) => {
            tracing::warn!(%body, "Server reported a connect error");
            return Some(SessionEnd::Dropped("connect error".into()));
        }
        Packet::Open(_) | Packet::Connect(_) | Packet::Pong | Packet::Noop => {
            tracing::trace!(raw_frame = %frame, "Ignoring control packet");
        }
    }
    None
}

fn dispatch_event(router: &EventRouter, name: &str, data: serde_json::Value) {
    match ServerEvent::from_parts(name, data) {
        Ok(event) => {
            let delivered = router.dispatch(&event);
            tracing::debug!(event = %event.name(), delivered, "Dispatched push event");
        }
        Err(EventDecodeError::UnknownEvent(name)) => {
            tracing::debug!(event = %name, "Ignoring unrecognised event");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed push event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use resumatch_events::EventName;
    use serde_json::json;

    use super::*;
    use crate::memory::{MemoryConnector, ServerEnd};
    use crate::transport::Connector;

    async fn connected() -> (Box<dyn Transport>, ServerEnd) {
        let (connector, mut accepted) = MemoryConnector::new();
        let transport = connector.connect().await.unwrap();
        let server = accepted.recv().await.unwrap();
        (transport, server)
    }

    #[tokio::test]
    async fn handshake_sends_namespace_connect() {
        let (mut transport, mut server) = connected().await;
        let server_task = tokio::spawn(async move {
            server.accept().await.unwrap();
            server
        });

        let handshake = open_session(transport.as_mut()).await.unwrap();
        assert_eq!(handshake, ServerEnd::handshake());
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_surfaces_connect_error() {
        let (mut transport, mut server) = connected().await;
        server.send(Packet::Open(ServerEnd::handshake()));
        server.send(Packet::ConnectError(json!({"message": "Not authorized"})));

        let err = open_session(transport.as_mut()).await.unwrap_err();
        assert!(matches!(err, ChannelError::Rejected(reason) if reason == "Not authorized"));
        assert_eq!(server.recv().await, Some(Packet::Connect(None)));
    }

    #[tokio::test]
    async fn events_are_dispatched_and_pings_answered() {
        let (mut transport, mut server) = connected().await;
        let router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        router.on(EventName::ParseStarted, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        server.send(Packet::Ping);
        server.push("parse_started", json!({"job_url": "https://x.test/1"}));
        server.push("something_else", json!({}));
        server.send_raw("42[garbage");
        server.send(Packet::Close);

        let cancel = CancellationToken::new();
        let end = process_frames(transport.as_mut(), &router, Duration::from_secs(60), &cancel).await;

        assert_eq!(end, SessionEnd::Dropped("transport close".into()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(server.recv().await, Some(Packet::Pong));
    }

    #[tokio::test]
    async fn namespace_disconnect_ends_without_reconnect() {
        let (mut transport, server) = connected().await;
        server.send(Packet::Disconnect);

        let end = process_frames(
            transport.as_mut(),
            &EventRouter::new(),
            Duration::from_secs(60),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(end, SessionEnd::Kicked);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_times_out() {
        let (mut transport, _server) = connected().await;
        let end = process_frames(
            transport.as_mut(),
            &EventRouter::new(),
            Duration::from_secs(45),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(end, SessionEnd::Dropped("heartbeat timeout".into()));
    }

    #[tokio::test]
    async fn cancellation_ends_processing() {
        let (mut transport, _server) = connected().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let end = process_frames(transport.as_mut(), &EventRouter::new(), Duration::from_secs(60), &cancel).await;
        assert_eq!(end, SessionEnd::Cancelled);
    }
}
