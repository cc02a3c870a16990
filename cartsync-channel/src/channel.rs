//! Connection registry and pending-request table.
//!
//! One live connection per context; registering again for the same context
//! replaces the previous connection. Every pending request belongs to the
//! connection it was sent on and is rejected when that connection goes away.
//!
//! The registry lock is a plain `std::sync::Mutex`: it is never held across
//! an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use cartsync_core::SyncError;

use crate::protocol::{ChannelRequest, RequestEnvelope, ResponseEnvelope};
use crate::tabs::{ContextId, TabLocator};

type Reply = oneshot::Sender<Result<Value, SyncError>>;

struct Connection {
    lease: u64,
    outbound: mpsc::UnboundedSender<RequestEnvelope>,
    pending: HashMap<u64, Reply>,
}

impl Connection {
    fn reject_pending(&mut self) {
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(SyncError::ChannelDisconnected));
        }
    }
}

/// Handle identifying one registered connection. Stale handles (replaced by a
/// newer registration for the same context) are ignored by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionLease {
    context: ContextId,
    lease: u64,
}

impl ConnectionLease {
    pub fn context(&self) -> &ContextId {
        &self.context
    }
}

pub struct RemoteChannel {
    locator: Arc<dyn TabLocator>,
    timeout: Duration,
    next_request: AtomicU64,
    next_lease: AtomicU64,
    connections: Mutex<HashMap<ContextId, Connection>>,
}

impl RemoteChannel {
    pub fn new(locator: Arc<dyn TabLocator>, timeout: Duration) -> Self {
        Self {
            locator,
            timeout,
            next_request: AtomicU64::new(1),
            next_lease: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn locator(&self) -> &Arc<dyn TabLocator> {
        &self.locator
    }

    /// Attach a connection for `context`. Requests for it are delivered on the
    /// returned receiver.
    pub fn register(
        &self,
        context: ContextId,
    ) -> (ConnectionLease, mpsc::UnboundedReceiver<RequestEnvelope>) {
        let lease = self.next_lease.fetch_add(1, Ordering::Relaxed);
        let (outbound, inbound) = mpsc::unbounded_channel();
        let replaced = self.lock().insert(
            context.clone(),
            Connection {
                lease,
                outbound,
                pending: HashMap::new(),
            },
        );
        if let Some(mut previous) = replaced {
            tracing::info!(context = %context, pending = previous.pending.len(), "replacing retailer connection");
            previous.reject_pending();
        } else {
            tracing::info!(context = %context, "retailer connection attached");
        }
        (ConnectionLease { context, lease }, inbound)
    }

    /// Detach the connection behind `lease` and reject everything still
    /// waiting on it. No-op if a newer connection has taken its place.
    pub fn disconnect(&self, lease: &ConnectionLease) {
        let mut connections = self.lock();
        let current = connections
            .get(&lease.context)
            .is_some_and(|conn| conn.lease == lease.lease);
        if !current {
            return;
        }
        if let Some(mut conn) = connections.remove(&lease.context) {
            tracing::info!(
                context = %lease.context,
                pending = conn.pending.len(),
                "retailer connection closed",
            );
            conn.reject_pending();
        }
    }

    /// Settle the pending request matching `response.id` on this connection.
    pub fn deliver(&self, lease: &ConnectionLease, response: ResponseEnvelope) {
        let reply = {
            let mut connections = self.lock();
            match connections.get_mut(&lease.context) {
                Some(conn) if conn.lease == lease.lease => conn.pending.remove(&response.id),
                _ => {
                    tracing::debug!(context = %lease.context, request_id = response.id, "reply on stale connection dropped");
                    return;
                }
            }
        };
        match reply {
            Some(reply) => {
                let _ = reply.send(response.into_result());
            }
            None => {
                tracing::debug!(context = %lease.context, request_id = response.id, "unmatched reply dropped");
            }
        }
    }

    pub fn is_connected(&self, context: &ContextId) -> bool {
        self.lock().contains_key(context)
    }

    /// Send `request` to the page script and wait for its reply.
    pub async fn call(&self, request: ChannelRequest) -> Result<Value, SyncError> {
        let context = self
            .locator
            .find_counterpart_tab()
            .await
            .ok_or(SyncError::ChannelUnavailable)?;

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let action = request.action();
        let receiver = {
            let mut connections = self.lock();
            let conn = connections
                .get_mut(&context)
                .ok_or(SyncError::ChannelNotConnected)?;
            let (reply, receiver) = oneshot::channel();
            conn.pending.insert(id, reply);
            if conn.outbound.send(RequestEnvelope { request, id }).is_err() {
                conn.pending.remove(&id);
                return Err(SyncError::ChannelNotConnected);
            }
            receiver
        };
        tracing::trace!(context = %context, request_id = id, action, "channel request sent");

        let slot = PendingSlot {
            channel: self,
            context: &context,
            id,
        };
        let outcome = match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SyncError::ChannelDisconnected),
            Err(_) => {
                tracing::warn!(context = %context, request_id = id, action, "channel request timed out");
                Err(SyncError::ChannelTimeout(self.timeout))
            }
        };
        drop(slot);
        outcome
    }

    fn evict(&self, context: &ContextId, id: u64) {
        if let Some(conn) = self.lock().get_mut(context) {
            conn.pending.remove(&id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextId, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Evicts a pending entry when its caller stops waiting (timeout or a dropped
/// future). Settled entries are already gone, making this a no-op.
struct PendingSlot<'a> {
    channel: &'a RemoteChannel,
    context: &'a ContextId,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.channel.evict(self.context, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabs::TabRegistry;

    fn channel_with_tab(tab: &str) -> (RemoteChannel, Arc<TabRegistry>) {
        let tabs = Arc::new(TabRegistry::new());
        tabs.open(ContextId::from(tab));
        (RemoteChannel::new(tabs.clone(), Duration::from_secs(5)), tabs)
    }

    #[tokio::test]
    async fn stale_lease_cannot_remove_replacement() {
        let (channel, _tabs) = channel_with_tab("tab-1");
        let (old, _old_rx) = channel.register(ContextId::from("tab-1"));
        let (_new, _new_rx) = channel.register(ContextId::from("tab-1"));

        channel.disconnect(&old);
        assert!(channel.is_connected(&ContextId::from("tab-1")));
    }

    #[tokio::test]
    async fn evicted_entry_leaves_table_empty() {
        let (channel, _tabs) = channel_with_tab("tab-1");
        let (_lease, _rx) = channel.register(ContextId::from("tab-1"));
        channel.evict(&ContextId::from("tab-1"), 99);
        let connections = channel.lock();
        let conn = connections.get(&ContextId::from("tab-1")).expect("conn");
        assert!(conn.pending.is_empty());
    }
}
