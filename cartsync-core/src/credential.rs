//! Bearer credential storage.
//!
//! A stored credential means "connected". Only the authenticated client and
//! the explicit connect/disconnect commands mutate it.
//!
//! # Storage layout
//!
//! ```text
//! ~/.cartsync/
//!   credential   (raw token, mode 0600)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::cartsync_root;
use crate::error::{storage_err, SyncError};

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SyncError>;

    fn set(&self, token: &str) -> Result<(), SyncError>;

    fn clear(&self) -> Result<(), SyncError>;

    /// Presence check; storage failures read as "not connected".
    fn is_present(&self) -> bool {
        matches!(self.get(), Ok(Some(_)))
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Token persisted at `<home>/.cartsync/credential`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn at(home: &Path) -> Self {
        Self {
            path: credential_path_at(home),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<home>/.cartsync/credential`: pure, no I/O.
pub fn credential_path_at(home: &Path) -> PathBuf {
    cartsync_root(home).join("credential")
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_err(&self.path, err)),
        }
    }

    /// Write flow: `.tmp` sibling → `chmod 0600` → `rename`.
    fn set(&self, token: &str) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(storage_err(
                &self.path,
                std::io::Error::other("invalid credential path"),
            ));
        };
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| storage_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
        let tmp = self.path.with_file_name("credential.tmp");
        std::fs::write(&tmp, token.trim()).map_err(|e| storage_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| storage_err(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "credential written");
        Ok(())
    }

    fn clear(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "credential removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(&self.path, err)),
        }
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| storage_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| storage_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SyncError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<String>, SyncError> {
        Ok(self.slot().clone())
    }

    fn set(&self, token: &str) -> Result<(), SyncError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SyncError> {
        *self.slot() = None;
        Ok(())
    }
}
