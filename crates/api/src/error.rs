use resumatch_core::error::CoreError;

use crate::credentials::CredentialError;

/// Errors from the REST client layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The session token was rejected. The session has been cleared.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// A request needing a session was made while logged out.
    #[error("Not logged in")]
    NoSession,

    /// The response body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// The request was rejected locally before reaching the network.
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    /// Whether the error ended the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
