//! Server-pushed progress events and the in-process router that fans
//! them out to listeners.
//!
//! - [`ServerEvent`]: the fixed set of named events the scoring service
//!   pushes into a user's room, with typed payloads.
//! - [`EventRouter`]: demultiplexes inbound events by name to every
//!   registered listener, synchronously and in registration order.

pub mod messages;
pub mod router;

pub use messages::{EventName, ServerEvent};
pub use router::{EventRouter, ListenerGuard, ListenerId};
