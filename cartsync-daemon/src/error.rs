use std::path::PathBuf;

use thiserror::Error;

use cartsync_core::ErrorPayload;

/// Error surface for the daemon runtime and its socket clients.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] cartsync_core::config::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] cartsync_core::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The daemon understood the request and refused it.
    #[error("{}: {}", .0.kind, .0.message)]
    Rejected(ErrorPayload),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
