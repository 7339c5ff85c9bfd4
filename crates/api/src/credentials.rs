//! Stored credentials.
//!
//! The session (token plus user) is kept as a small JSON file so the next
//! start can restore it without logging in again.

use std::io::ErrorKind;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use resumatch_core::session::Session;
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// JSON file holding the persisted [`Session`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. A missing file means "logged out".
    pub async fn load(&self) -> Result<Option<Session>, CredentialError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `session`, creating the parent directory if needed. On unix
    /// the file is readable by its owner only.
    pub async fn save(&self, session: &Session) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(session)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await?;
        // `mode` only applies when the file is created.
        #[cfg(unix)]
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Remove the stored session. Removing an absent file is not an error.
    pub async fn clear(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
