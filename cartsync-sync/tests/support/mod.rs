//! Scripted stand-ins for the retailer page script and the inventory service.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cartsync_client::{AuthPolicy, AuthenticatedClient, HttpRequest, HttpResponse, HttpTransport};
use cartsync_core::{
    DateRange, MemoryCredentialStore, RecordDetail, RecordId, RecordSummary, SyncError,
};
use cartsync_sync::{ProgressPublisher, RetailerApi, SyncOrchestrator};
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const FETCH_INTERVAL: Duration = Duration::from_secs(1);

pub fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2026, 7, 21).expect("date"),
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
    )
    .expect("range")
}

// ---------------------------------------------------------------------------
// Retailer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedRetailer {
    listing: Vec<RecordId>,
    listing_error: Option<String>,
    details: HashMap<RecordId, Option<RecordDetail>>,
    logged_in: bool,
    gate: Option<Arc<Notify>>,
    pub listings: AtomicUsize,
    pub login_checks: AtomicUsize,
    fetched: Mutex<Vec<(RecordId, Instant)>>,
}

impl ScriptedRetailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing(mut self, ids: &[&str]) -> Self {
        self.listing = ids.iter().map(|id| RecordId::from(*id)).collect();
        self
    }

    pub fn failing_listing(mut self, message: &str) -> Self {
        self.listing_error = Some(message.to_string());
        self
    }

    /// Ids without a scripted detail fail with a remote error.
    pub fn detail(mut self, id: &str, detail: Value) -> Self {
        let detail = match detail {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self.details.insert(RecordId::from(id), detail);
        self
    }

    pub fn logged_in(mut self, logged_in: bool) -> Self {
        self.logged_in = logged_in;
        self
    }

    /// Hold the listing phase until the returned handle is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn fetched(&self) -> Vec<(RecordId, Instant)> {
        self.fetched.lock().expect("fetched").clone()
    }
}

#[async_trait]
impl RetailerApi for ScriptedRetailer {
    async fn list_records(&self, _range: &DateRange) -> Result<Vec<RecordSummary>, SyncError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = &self.listing_error {
            return Err(SyncError::Remote(message.clone()));
        }
        Ok(self
            .listing
            .iter()
            .map(|id| RecordSummary { id: id.clone() })
            .collect())
    }

    async fn fetch_record_detail(&self, id: &RecordId) -> Result<Option<RecordDetail>, SyncError> {
        self.fetched
            .lock()
            .expect("fetched")
            .push((id.clone(), Instant::now()));
        match self.details.get(id) {
            Some(detail) => Ok(detail.clone()),
            None => Err(SyncError::Remote(format!("order {id} not found"))),
        }
    }

    async fn check_login(&self) -> Result<bool, SyncError> {
        self.login_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.logged_in)
    }
}

// ---------------------------------------------------------------------------
// Inventory service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, SyncError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn replying(replies: Vec<Result<HttpResponse, SyncError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.seen.lock().expect("seen").clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        self.seen.lock().expect("seen").push(request);
        self.replies
            .lock()
            .expect("replies")
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(500, "script exhausted")))
    }
}

pub fn client(transport: Arc<ScriptedTransport>) -> Arc<AuthenticatedClient> {
    Arc::new(AuthenticatedClient::new(
        transport,
        Arc::new(MemoryCredentialStore::with_token("tok-1")),
        "https://inventory.example/api",
        AuthPolicy::default(),
    ))
}

pub fn orchestrator(
    retailer: Arc<ScriptedRetailer>,
    transport: Arc<ScriptedTransport>,
) -> Arc<SyncOrchestrator> {
    Arc::new(SyncOrchestrator::new(
        retailer,
        client(transport),
        ProgressPublisher::default(),
        FETCH_INTERVAL,
    ))
}
