//! Shared domain types for the resumatch client.
//!
//! Everything here is plain data: identifiers, the authenticated
//! [`Session`](session::Session), the résumé / job / match models returned
//! by the scoring service, and the client-side request validation that
//! runs before anything reaches the network.

pub mod error;
pub mod models;
pub mod session;
pub mod types;
pub mod validation;
