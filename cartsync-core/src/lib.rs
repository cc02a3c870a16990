//! cartsync core library: domain types, error taxonomy, allow-list filter,
//! configuration and credential storage.
//!
//! - [`types`]: records, progress snapshots, sync outcomes, status views
//! - [`error`]: [`SyncError`] and its serialized [`ErrorPayload`]
//! - [`filter`]: field allow-list applied before records leave the process
//! - [`dates`]: sync windows and counterpart date conversion
//! - [`config`]: `~/.cartsync/config.yaml`
//! - [`credential`]: bearer credential storage

pub mod config;
pub mod credential;
pub mod dates;
pub mod error;
pub mod filter;
pub mod types;

pub use config::Config;
pub use credential::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use dates::DateRange;
pub use error::{ErrorPayload, SyncError};
pub use filter::{filter_record, ImportRecord};
pub use types::{
    ConnectionStatus, CredentialValidity, ImportSummary, ProgressPhase, ProgressSnapshot,
    RecordDetail, RecordId, RecordSummary, SyncOutcome, SyncReport,
};
