//! Push channel client for the scoring service.
//!
//! Speaks Socket.IO over WebSocket, keeps one connection per
//! authenticated session joined to the user's room, reconnects with
//! backoff, and dispatches inbound events through an
//! [`EventRouter`](resumatch_events::EventRouter).

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod processor;
pub mod protocol;
pub mod reconnect;
pub mod transport;

pub use client::{ChannelClient, ConnectionState};
pub use reconnect::ReconnectConfig;
pub use transport::{ChannelError, Connector, Transport, WsConnector};
