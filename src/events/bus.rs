use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::domain::StatusUpdate;

/// Default per-channel buffer. Lagging receivers lose oldest updates rather
/// than stalling publishers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Process-wide publish/subscribe hub for order status updates.
///
/// Every update goes to the global channel and, when someone is watching the
/// order, to that order's channel. Per-order channels are created lazily on
/// first subscription and pruned once their last receiver is gone. Delivery
/// is best-effort: nothing is buffered for future subscribers and a slow
/// receiver only loses its own backlog.
pub struct EventBus {
    global: RwLock<Option<broadcast::Sender<StatusUpdate>>>,
    per_order: DashMap<Uuid, broadcast::Sender<StatusUpdate>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (global, _) = broadcast::channel(capacity);
        Self {
            global: RwLock::new(Some(global)),
            per_order: DashMap::new(),
            capacity,
        }
    }

    /// Deliver one update to the order's subscribers and the global channel,
    /// in that order. A send error just means nobody is listening.
    pub async fn publish(&self, update: StatusUpdate) {
        let guard = self.global.read().await;
        let Some(global_tx) = guard.as_ref() else {
            debug!(order_id = %update.order_id, "Event bus closed, dropping update");
            return;
        };

        if let Some(entry) = self.per_order.get(&update.order_id) {
            let _ = entry.send(update.clone());
        }
        let _ = global_tx.send(update);
    }

    /// Subscribe to a single order's updates.
    pub async fn subscribe_order(&self, order_id: Uuid) -> broadcast::Receiver<StatusUpdate> {
        if self.global.read().await.is_none() {
            // Closed bus: hand back a receiver that reports Closed right away.
            return broadcast::channel(1).1;
        }
        self.per_order
            .entry(order_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Subscribe to every order's updates.
    pub async fn subscribe_all(&self) -> broadcast::Receiver<StatusUpdate> {
        match self.global.read().await.as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Drop the order's channel if no receiver is left. Called by stream
    /// handlers when a subscriber disconnects.
    pub fn prune_order(&self, order_id: Uuid) {
        self.per_order
            .remove_if(&order_id, |_, tx| tx.receiver_count() == 0);
    }

    /// Number of orders with a live fan-out channel.
    pub fn active_order_channels(&self) -> usize {
        self.per_order.len()
    }

    /// Tear down the bus: drops every per-order channel and the global
    /// sender, so all receivers observe Closed after draining their buffers.
    /// Later publishes are discarded.
    pub async fn close(&self) {
        let mut guard = self.global.write().await;
        guard.take();
        self.per_order.clear();
        debug!("Event bus closed");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
