//! REST client for the scoring service.
//!
//! [`ApiClient`] covers the auth, résumé, job and match endpoints. Every
//! authenticated request carries the bearer token of the current
//! [`SessionStore`] session; a `401` on such a request invalidates the
//! session and removes the stored credentials.

pub mod client;
pub mod credentials;
pub mod error;
pub mod responses;
pub mod session;

pub use client::ApiClient;
pub use credentials::CredentialStore;
pub use error::ApiError;
pub use session::SessionStore;
