//! Typed access to the retailer page script.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use cartsync_channel::{ChannelRequest, RemoteChannel};
use cartsync_core::{DateRange, RecordDetail, RecordId, RecordSummary, SyncError};

#[async_trait]
pub trait RetailerApi: Send + Sync {
    async fn list_records(&self, range: &DateRange) -> Result<Vec<RecordSummary>, SyncError>;

    /// `Ok(None)` when the retailer returned nothing usable for `id`.
    async fn fetch_record_detail(&self, id: &RecordId) -> Result<Option<RecordDetail>, SyncError>;

    async fn check_login(&self) -> Result<bool, SyncError>;
}

/// [`RetailerApi`] over the page-script channel.
pub struct ChannelRetailer {
    channel: Arc<RemoteChannel>,
}

impl ChannelRetailer {
    pub fn new(channel: Arc<RemoteChannel>) -> Self {
        Self { channel }
    }

    pub async fn ping(&self) -> Result<(), SyncError> {
        self.channel.call(ChannelRequest::Ping).await.map(|_| ())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListedRecord {
    Id(RecordId),
    Summary(RecordSummary),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoginState {
    Flag(bool),
    Object {
        #[serde(alias = "loggedIn")]
        logged_in: bool,
    },
}

#[async_trait]
impl RetailerApi for ChannelRetailer {
    async fn list_records(&self, range: &DateRange) -> Result<Vec<RecordSummary>, SyncError> {
        let result = self
            .channel
            .call(ChannelRequest::FetchRecords {
                start_date: range.counterpart_start(),
                end_date: range.counterpart_end(),
            })
            .await?;
        parse_listing(result)
    }

    async fn fetch_record_detail(&self, id: &RecordId) -> Result<Option<RecordDetail>, SyncError> {
        let result = self
            .channel
            .call(ChannelRequest::FetchRecordDetail {
                record_id: id.clone(),
            })
            .await?;
        Ok(match result {
            Value::Object(detail) if !detail.is_empty() => Some(detail),
            _ => None,
        })
    }

    async fn check_login(&self) -> Result<bool, SyncError> {
        let result = self.channel.call(ChannelRequest::CheckLogin).await?;
        let state: LoginState = serde_json::from_value(result)?;
        Ok(match state {
            LoginState::Flag(flag) => flag,
            LoginState::Object { logged_in } => logged_in,
        })
    }
}

fn parse_listing(result: Value) -> Result<Vec<RecordSummary>, SyncError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    let listed: Vec<ListedRecord> = serde_json::from_value(result)
        .map_err(|e| SyncError::Protocol(format!("unexpected record listing: {e}")))?;
    Ok(listed
        .into_iter()
        .map(|entry| match entry {
            ListedRecord::Id(id) => RecordSummary { id },
            ListedRecord::Summary(summary) => summary,
        })
        .collect())
}
