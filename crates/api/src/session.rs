//! The current session, shared by the REST client, the push channel and
//! the orchestrators.
//!
//! Changes are published on a [`watch`] channel so the push channel can
//! follow login and logout (see `ChannelClient::follow_session`).

use std::sync::Arc;

use resumatch_core::session::Session;
use resumatch_core::types::DbId;
use tokio::sync::watch;

use crate::credentials::{CredentialError, CredentialStore};

/// Cheaply cloneable handle to the current [`Session`].
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
    credentials: Option<CredentialStore>,
}

impl SessionStore {
    /// A store backed by a credential file.
    pub fn new(credentials: CredentialStore) -> Self {
        Self::build(Some(credentials))
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    fn build(credentials: Option<CredentialStore>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            credentials,
        }
    }

    /// Load the persisted session, if any, and publish it.
    pub async fn restore(&self) -> Result<Option<Session>, CredentialError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };
        let session = credentials.load().await?;
        if let Some(session) = &session {
            tracing::info!(user_id = session.user_id(), "Restored stored session");
        }
        self.tx.send_replace(session.clone());
        Ok(session)
    }

    /// Persist and publish a freshly issued session.
    pub async fn login(&self, session: Session) -> Result<(), CredentialError> {
        if let Some(credentials) = &self.credentials {
            credentials.save(&session).await?;
        }
        tracing::info!(user_id = session.user_id(), "Session started");
        self.tx.send_replace(Some(session));
        Ok(())
    }

    /// End the session and remove the stored credentials.
    pub async fn logout(&self) -> Result<(), CredentialError> {
        let previous = self.tx.send_replace(None);
        if let Some(previous) = previous {
            tracing::info!(user_id = previous.user_id(), "Session ended");
        }
        match &self.credentials {
            Some(credentials) => credentials.clear().await,
            None => Ok(()),
        }
    }

    /// The server rejected the token: drop the session and its stored
    /// credentials. Never fails; a credential removal error is logged.
    pub async fn invalidate(&self) {
        let previous = self.tx.send_replace(None);
        tracing::warn!(
            user_id = previous.as_ref().map(Session::user_id),
            "Session rejected by server, credentials cleared",
        );
        if let Some(credentials) = &self.credentials {
            if let Err(e) = credentials.clear().await {
                tracing::error!(error = %e, "Failed to remove stored credentials");
            }
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<DbId> {
        self.tx.borrow().as_ref().map(Session::user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
