//! Sync state machine: `Idle → Listing → Fetching(i of N) → Importing → Idle`.
//!
//! At most one run is active at a time. A second `start` is rejected with
//! [`SyncError::AlreadyInProgress`], never queued. Detail fetches run one at
//! a time in listing order, separated by a fixed pause; a failed record is
//! counted and skipped, never fatal on its own.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};

use cartsync_client::{ApiRequest, AuthenticatedClient, HttpResponse};
use cartsync_core::{
    filter_record, DateRange, ImportRecord, ImportSummary, ProgressSnapshot, RecordDetail,
    RecordId, RecordSummary, SyncError, SyncOutcome, SyncReport,
};

use crate::progress::ProgressPublisher;
use crate::retailer::RetailerApi;

/// Import endpoint on the inventory service.
pub const IMPORT_PATH: &str = "/import";

/// Statuses under which a JSON `message` is treated as a validation failure.
const VALIDATION_STATUSES: &[u16] = &[400, 422];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub in_progress: bool,
    pub progress: Option<ProgressSnapshot>,
}

pub struct SyncOrchestrator {
    retailer: Arc<dyn RetailerApi>,
    client: Arc<AuthenticatedClient>,
    publisher: ProgressPublisher,
    fetch_interval: Duration,
    state: Mutex<SyncState>,
}

impl SyncOrchestrator {
    pub fn new(
        retailer: Arc<dyn RetailerApi>,
        client: Arc<AuthenticatedClient>,
        publisher: ProgressPublisher,
        fetch_interval: Duration,
    ) -> Self {
        Self {
            retailer,
            client,
            publisher,
            fetch_interval,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().in_progress
    }

    pub fn publisher(&self) -> &ProgressPublisher {
        &self.publisher
    }

    /// Run one sync over `range`.
    ///
    /// State is reset and a final `None` progress is published on every exit
    /// path, including errors.
    pub async fn start(&self, range: DateRange) -> Result<SyncOutcome, SyncError> {
        let _run = self.try_begin().ok_or(SyncError::AlreadyInProgress)?;
        tracing::info!(start = %range.start, end = %range.end, "sync started");

        let result = self.run(&range).await;
        match &result {
            Ok(SyncOutcome::Empty { .. }) => tracing::info!("sync finished: no records in range"),
            Ok(SyncOutcome::Completed(report)) => tracing::info!(
                imported = report.imported,
                duplicates = report.duplicates,
                skipped = report.skipped,
                errors = report.errors,
                fetch_failed = report.fetch_failed,
                "sync finished",
            ),
            Err(err) => tracing::warn!(kind = err.kind(), error = %err, "sync failed"),
        }
        result
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        let mut state = self.lock();
        if state.in_progress {
            return None;
        }
        *state = SyncState {
            in_progress: true,
            progress: None,
        };
        Some(RunGuard { orchestrator: self })
    }

    async fn run(&self, range: &DateRange) -> Result<SyncOutcome, SyncError> {
        self.report(ProgressSnapshot::listing());
        let listed = self.retailer.list_records(range).await?;
        if listed.is_empty() {
            return Ok(SyncOutcome::empty());
        }

        let (details, failed) = self.fetch_details(&listed).await;
        if details.is_empty() {
            return Err(SyncError::FetchFailed { failed_ids: failed });
        }

        self.report(ProgressSnapshot::importing(details.len()));
        let records: Vec<ImportRecord> = details.iter().map(filter_record).collect();
        let summary = self.submit(&records).await?;
        Ok(SyncOutcome::Completed(SyncReport::from_import(
            summary,
            failed.len(),
        )))
    }

    async fn fetch_details(
        &self,
        listed: &[RecordSummary],
    ) -> (Vec<RecordDetail>, Vec<RecordId>) {
        let total = listed.len();
        let mut details = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (index, summary) in listed.iter().enumerate() {
            self.report(ProgressSnapshot::fetching(index + 1, total));
            match self.retailer.fetch_record_detail(&summary.id).await {
                Ok(Some(detail)) if !detail.is_empty() => details.push(detail),
                Ok(_) => {
                    tracing::warn!(record_id = %summary.id, "retailer returned no detail");
                    failed.push(summary.id.clone());
                }
                Err(err) => {
                    tracing::warn!(record_id = %summary.id, error = %err, "detail fetch failed");
                    failed.push(summary.id.clone());
                }
            }

            if index + 1 < total {
                tokio::time::sleep(self.fetch_interval).await;
            }
        }
        (details, failed)
    }

    async fn submit(&self, records: &[ImportRecord]) -> Result<ImportSummary, SyncError> {
        let response = self
            .client
            .request(ApiRequest::post(IMPORT_PATH, json!({ "records": records })))
            .await?;
        if !response.is_success() {
            return Err(classify_failure(&response));
        }
        response.json()
    }

    fn report(&self, snapshot: ProgressSnapshot) {
        tracing::debug!(
            phase = %snapshot.phase,
            current = snapshot.current,
            total = snapshot.total,
            "sync progress",
        );
        self.lock().progress = Some(snapshot.clone());
        self.publisher.publish(Some(snapshot));
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held for the duration of a run; dropping it returns the orchestrator to idle.
struct RunGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.lock() = SyncState::default();
        self.orchestrator.publisher.publish(None);
    }
}

fn classify_failure(response: &HttpResponse) -> SyncError {
    let message = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| {
            ["message", "error"]
                .iter()
                .find_map(|key| body.get(key).and_then(Value::as_str).map(str::to_string))
        });
    match message {
        Some(message) if VALIDATION_STATUSES.contains(&response.status) => {
            SyncError::Validation(message)
        }
        _ => SyncError::Server {
            status: response.status,
        },
    }
}
