//! Domain types for the purchase-history sync.
//!
//! Records coming from the retailer stay as raw JSON objects until they pass
//! through [`crate::filter`]; everything else is strongly typed.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Opaque retailer identifier for a purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Listing-phase entry: just enough to request the full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    #[serde(alias = "orderId")]
    pub id: RecordId,
}

/// Full record as returned by the retailer, including fields that must never
/// reach the inventory service. Use [`crate::filter_record`] before submitting.
pub type RecordDetail = Map<String, Value>;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Listing,
    Fetching,
    Importing,
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressPhase::Listing => write!(f, "listing"),
            ProgressPhase::Fetching => write!(f, "fetching"),
            ProgressPhase::Importing => write!(f, "importing"),
        }
    }
}

/// Point-in-time view of a running sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn listing() -> Self {
        Self {
            phase: ProgressPhase::Listing,
            current: None,
            total: None,
            message: "Fetching order list...".to_string(),
        }
    }

    /// `current` is 1-based.
    pub fn fetching(current: usize, total: usize) -> Self {
        Self {
            phase: ProgressPhase::Fetching,
            current: Some(current),
            total: Some(total),
            message: format!("Fetching order {current} of {total}..."),
        }
    }

    pub fn importing(count: usize) -> Self {
        Self {
            phase: ProgressPhase::Importing,
            current: None,
            total: None,
            message: format!("Importing {count} orders..."),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Canonical response of the inventory service's import endpoint.
///
/// The service is lenient about its own shape: counters may be missing and
/// `errors` may arrive either as a count or as a list of error entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub duplicates: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default, deserialize_with = "count_or_list")]
    pub errors: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountOrList {
    Count(u64),
    List(Vec<Value>),
    Null(()),
}

fn count_or_list<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CountOrList::deserialize(deserializer)? {
        CountOrList::Count(n) => n,
        CountOrList::List(items) => items.len() as u64,
        CountOrList::Null(()) => 0,
    })
}

/// Final report of a sync run that reached the import phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub imported: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Records whose detail fetch failed; they were skipped, not imported.
    pub fetch_failed: usize,
}

impl SyncReport {
    pub fn from_import(summary: ImportSummary, fetch_failed: usize) -> Self {
        Self {
            success: true,
            imported: summary.imported,
            duplicates: summary.duplicates,
            skipped: summary.skipped,
            errors: summary.errors,
            fetch_failed,
        }
    }
}

/// Successful result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncOutcome {
    /// The listing returned nothing; no fetch or import happened.
    Empty { success: bool, count: usize },
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn empty() -> Self {
        SyncOutcome::Empty {
            success: true,
            count: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValidity {
    pub valid: bool,
    /// Validity could not be determined because the probe never reached the service.
    #[serde(default)]
    pub network_error: bool,
}

impl CredentialValidity {
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn indeterminate() -> Self {
        Self {
            valid: false,
            network_error: true,
        }
    }
}

/// Readiness view composed by the status aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub warehouse_connected: bool,
    pub counterpart_connected: bool,
    pub has_counterpart_tab: bool,
    #[serde(default)]
    pub network_error: bool,
    pub sync_in_progress: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_progress: Option<ProgressSnapshot>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
