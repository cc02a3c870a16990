//! Control surface exposed to the calling UI: status, connect, disconnect,
//! start sync, progress subscription.

use std::sync::Arc;

use tokio::sync::broadcast;

use cartsync_channel::TabLocator;
use cartsync_client::{AuthPolicy, AuthenticatedClient, HttpTransport};
use cartsync_core::{
    Config, ConnectionStatus, CredentialStore, DateRange, ProgressSnapshot, SyncError, SyncOutcome,
};

use crate::orchestrator::SyncOrchestrator;
use crate::progress::ProgressPublisher;
use crate::retailer::RetailerApi;
use crate::status::StatusAggregator;

pub struct Coordinator {
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    orchestrator: Arc<SyncOrchestrator>,
    status: StatusAggregator,
}

impl Coordinator {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        transport: Arc<dyn HttpTransport>,
        retailer: Arc<dyn RetailerApi>,
        locator: Arc<dyn TabLocator>,
    ) -> Self {
        let client = Arc::new(AuthenticatedClient::new(
            transport,
            credentials.clone(),
            config.inventory_url.clone(),
            AuthPolicy {
                retry_delay: config.auth_retry_delay(),
            },
        ));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            retailer.clone(),
            client.clone(),
            ProgressPublisher::default(),
            config.fetch_interval(),
        ));
        let status = StatusAggregator::new(orchestrator.clone(), client, retailer, locator);
        Self {
            config,
            credentials,
            orchestrator,
            status,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub async fn get_status(&self) -> ConnectionStatus {
        self.status.compute_status().await
    }

    /// Store a token obtained from the external authorization flow and report
    /// the resulting status.
    pub async fn connect(&self, token: &str) -> Result<ConnectionStatus, SyncError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SyncError::Validation("token must not be empty".to_string()));
        }
        self.credentials.set(token)?;
        tracing::info!("inventory credential stored");
        Ok(self.get_status().await)
    }

    pub fn disconnect(&self) -> Result<(), SyncError> {
        self.credentials.clear()?;
        tracing::info!("inventory credential cleared");
        Ok(())
    }

    /// Start a sync over ISO dates; omitted bounds fall back to the trailing
    /// default window ending today.
    pub async fn start_sync(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        let range = DateRange::resolve(start, end, self.config.default_window_days)?;
        self.orchestrator.start(range).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Option<ProgressSnapshot>> {
        self.orchestrator.publisher().subscribe()
    }
}
