//! Best-effort fan-out of progress snapshots.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cartsync_core::ProgressSnapshot;

/// One-way message sent to progress observers. `None` marks the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObserverMessage {
    Progress { progress: Option<ProgressSnapshot> },
}

/// Publishes to whoever is subscribed right now. Having no observers is
/// normal; slow observers lose the oldest snapshots rather than blocking.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    tx: broadcast::Sender<Option<ProgressSnapshot>>,
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, snapshot: Option<ProgressSnapshot>) {
        if self.tx.send(snapshot).is_err() {
            tracing::trace!("no progress observers attached");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Option<ProgressSnapshot>> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}
