//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by an optional payload. Engine `message` packets (`4`) carry a
//! Socket.IO packet, itself a type digit, an optional `/namespace,`, an
//! optional ack id, and a JSON body. Only the default namespace and the
//! text packet types the push channel uses are modelled; binary packets
//! are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session parameters sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered
    /// dead: one ping interval plus the ping timeout.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine `0`: transport session opened.
    Open(Handshake),
    /// Engine `1`: transport closing.
    Close,
    /// Engine `2`: heartbeat request from the server.
    Ping,
    /// Engine `3`: heartbeat reply.
    Pong,
    /// Engine `6`.
    Noop,
    /// Socket `40`: namespace connect (client request or server ack).
    Connect(Option<Value>),
    /// Socket `41`: namespace disconnect.
    Disconnect,
    /// Socket `42`: a named event with its payload.
    Event { name: String, data: Value },
    /// Socket `44`: the server refused the namespace connect.
    ConnectError(Value),
}

impl Packet {
    /// Convenience constructor for an outbound event.
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Packet::Event {
            name: name.into(),
            data,
        }
    }
}

/// Encode a packet as a text frame.
pub fn encode(packet: &Packet) -> Result<String, ProtocolError> {
    let frame = match packet {
        Packet::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
        Packet::Close => "1".to_string(),
        Packet::Ping => "2".to_string(),
        Packet::Pong => "3".to_string(),
        Packet::Noop => "6".to_string(),
        Packet::Connect(None) => "40".to_string(),
        Packet::Connect(Some(body)) => format!("40{}", serde_json::to_string(body)?),
        Packet::Disconnect => "41".to_string(),
        Packet::Event { name, data } => {
            let body = if data.is_null() {
                serde_json::json!([name])
            } else {
                serde_json::json!([name, data])
            };
            format!("42{}", serde_json::to_string(&body)?)
        }
        Packet::ConnectError(body) => format!("44{}", serde_json::to_string(body)?),
    };
    Ok(frame)
}

/// Decode a text frame into a [`Packet`].
pub fn decode(frame: &str) -> Result<Packet, ProtocolError> {
    let mut chars = frame.chars();
    let engine_type = chars.next().ok_or(ProtocolError::Empty)?;
    let rest = chars.as_str();

    match engine_type {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        // Payloads on a ping only occur during transport upgrade.
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(rest),
        '6' => Ok(Packet::Noop),
        other => Err(ProtocolError::UnknownEngineType(other)),
    }
}

fn decode_socket(frame: &str) -> Result<Packet, ProtocolError> {
    let mut chars = frame.chars();
    let socket_type = chars.next().ok_or(ProtocolError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str())?);

    match socket_type {
        '0' => {
            if body.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                Ok(Packet::Connect(Some(serde_json::from_str(body)?)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '4' => Ok(Packet::ConnectError(serde_json::from_str(body)?)),
        other => Err(ProtocolError::UnsupportedSocketType(other)),
    }
}

/// Only the default namespace is supported; `/,` is tolerated.
fn strip_namespace(body: &str) -> Result<&str, ProtocolError> {
    if !body.starts_with('/') {
        return Ok(body);
    }
    let (namespace, rest) = body.split_once(',').unwrap_or((body, ""));
    if namespace == "/" {
        Ok(rest)
    } else {
        Err(ProtocolError::Namespace(namespace.to_string()))
    }
}

fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<Packet, ProtocolError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Array(mut items) = value else {
        return Err(ProtocolError::MalformedEvent("event body is not an array"));
    };
    if items.is_empty() {
        return Err(ProtocolError::MalformedEvent("event array is empty"));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(ProtocolError::MalformedEvent("event name is not a string"));
    };
    let data = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };
    Ok(Packet::Event { name, data })
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown Engine.IO packet type '{0}'")]
    UnknownEngineType(char),

    #[error("Unsupported Socket.IO packet type '{0}'")]
    UnsupportedSocketType(char),

    #[error("Unsupported namespace {0}")]
    Namespace(String),

    #[error("Malformed event packet: {0}")]
    MalformedEvent(&'static str),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}
