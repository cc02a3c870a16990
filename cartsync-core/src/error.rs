//! Error taxonomy shared by every cartsync crate.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RecordId;

/// All failures the sync core can surface to a caller.
///
/// Per-record detail failures are not represented here: they are collected
/// into [`crate::SyncReport::fetch_failed`] and never raised on their own.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No credential is stored.
    #[error("not connected to the inventory service")]
    NotAuthenticated,

    /// Transport-level failure (DNS, refused connection, timeout). Never
    /// treated as proof that the credential is invalid.
    #[error("network error: {0}")]
    Network(String),

    /// Two consecutive 401 responses; the credential has been cleared.
    #[error("session expired; reconnect to the inventory service")]
    SessionExpired,

    /// No open tab hosts the counterpart script.
    #[error("no retailer tab is open")]
    ChannelUnavailable,

    /// A retailer tab is open but its script has not attached (or was reloaded).
    #[error("retailer tab is open but its script is not connected; reload the tab")]
    ChannelNotConnected,

    /// The connection carrying a pending request closed or was replaced.
    #[error("retailer connection closed before responding")]
    ChannelDisconnected,

    /// The counterpart did not answer within the round-trip budget.
    #[error("retailer did not respond within {0:?}")]
    ChannelTimeout(Duration),

    /// Every listed record failed to fetch; nothing was imported.
    #[error("failed to fetch all {} record details", failed_ids.len())]
    FetchFailed { failed_ids: Vec<RecordId> },

    /// The inventory service rejected the payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// The inventory service answered with an unexpected status.
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// A sync run is already active; the caller must retry later.
    #[error("a sync is already in progress")]
    AlreadyInProgress,

    /// The peer did not recognise the requested action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The counterpart script reported an error for a request.
    #[error("retailer error: {0}")]
    Remote(String),

    /// A payload did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Credential file could not be read or written.
    #[error("credential storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Stable tag for this failure, used as the `kind` of [`ErrorPayload`].
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::NotAuthenticated => "NotAuthenticated",
            SyncError::Network(_) => "NetworkError",
            SyncError::SessionExpired => "SessionExpired",
            SyncError::ChannelUnavailable => "ChannelUnavailable",
            SyncError::ChannelNotConnected => "ChannelNotConnected",
            SyncError::ChannelDisconnected => "ChannelDisconnected",
            SyncError::ChannelTimeout(_) => "ChannelTimeout",
            SyncError::FetchFailed { .. } => "FetchFailed",
            SyncError::Validation(_) => "ValidationError",
            SyncError::Server { .. } => "ServerError",
            SyncError::AlreadyInProgress => "AlreadyInProgress",
            SyncError::UnknownAction(_) => "UnknownAction",
            SyncError::Remote(_) => "RemoteError",
            SyncError::Protocol(_) => "ProtocolError",
            SyncError::Storage { .. } => "StorageError",
        }
    }

    /// Transport failures are transient and say nothing about the credential.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

/// Structured `{kind, message}` pair handed to callers for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl From<&SyncError> for ErrorPayload {
    fn from(err: &SyncError) -> Self {
        err.to_payload()
    }
}

/// Convenience constructor for [`SyncError::Storage`].
pub(crate) fn storage_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Storage {
        path: path.into(),
        source,
    }
}
