//! Authenticated session identity.
//!
//! A [`Session`] is created by a successful login or signup and destroyed
//! on logout or when the server rejects its token. The channel client only
//! ever borrows it to learn which per-user room to join.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// The account a session belongs to, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    #[serde(default, with = "crate::types::lenient_timestamp")]
    pub created_at: Option<Timestamp>,
}

/// Bearer token plus the user it was issued for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// Identifier used to key the per-user push room.
    pub fn user_id(&self) -> DbId {
        self.user.id
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "secret-token",
            User {
                id: 42,
                email: "ada@example.com".into(),
                created_at: None,
            },
        )
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("ada@example.com"));
    }

    #[test]
    fn bearer_header_value() {
        assert_eq!(session().bearer(), "Bearer secret-token");
        assert_eq!(session().user_id(), 42);
    }

    #[test]
    fn user_created_at_is_optional() {
        let user: User = serde_json::from_str(r#"{"id":1,"email":"a@b.c"}"#).unwrap();
        assert!(user.created_at.is_none());
    }
}
