//! Point-in-time readiness view.

use std::sync::Arc;

use cartsync_channel::TabLocator;
use cartsync_client::AuthenticatedClient;
use cartsync_core::ConnectionStatus;

use crate::orchestrator::SyncOrchestrator;
use crate::retailer::RetailerApi;

pub struct StatusAggregator {
    orchestrator: Arc<SyncOrchestrator>,
    client: Arc<AuthenticatedClient>,
    retailer: Arc<dyn RetailerApi>,
    locator: Arc<dyn TabLocator>,
}

impl StatusAggregator {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        client: Arc<AuthenticatedClient>,
        retailer: Arc<dyn RetailerApi>,
        locator: Arc<dyn TabLocator>,
    ) -> Self {
        Self {
            orchestrator,
            client,
            retailer,
            locator,
        }
    }

    /// Compose the current status.
    ///
    /// While a sync is running the credential is not revalidated and the
    /// retailer login is not probed: both would spend request budget the run
    /// needs and the run itself proves the counterpart is reachable.
    pub async fn compute_status(&self) -> ConnectionStatus {
        let credential_present = self.client.credentials().is_present();
        let has_counterpart_tab = self.locator.find_counterpart_tab().await.is_some();

        let state = self.orchestrator.state();
        if state.in_progress {
            return ConnectionStatus {
                warehouse_connected: credential_present,
                counterpart_connected: true,
                has_counterpart_tab,
                network_error: false,
                sync_in_progress: true,
                sync_progress: state.progress,
            };
        }

        let counterpart_connected = if has_counterpart_tab {
            match self.retailer.check_login().await {
                Ok(logged_in) => logged_in,
                Err(err) => {
                    tracing::debug!(kind = err.kind(), error = %err, "retailer login probe failed");
                    false
                }
            }
        } else {
            false
        };

        let validity = if credential_present {
            self.client.validate_credential().await
        } else {
            Default::default()
        };

        ConnectionStatus {
            warehouse_connected: validity.valid,
            counterpart_connected,
            has_counterpart_tab,
            network_error: validity.network_error,
            sync_in_progress: false,
            sync_progress: None,
        }
    }
}
