use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::domain::{
    CreateOrderRequest, Order, OrderStatus, OrderUpdate, StatusPayload, StatusUpdate,
};
use crate::error::{OrderError, Result};
use crate::events::EventBus;
use crate::orders::{OrderStore, SnapshotCache};

/// Owns the order lifecycle: creation, lookups through the snapshot cache,
/// and every state transition.
///
/// A transition persists status plus its field patch in one update, refreshes
/// the cache, and publishes exactly one StatusUpdate. Concurrent mutation of
/// one order is ruled out upstream by the queue's per-id dedup, so reads and
/// writes here need no extra locking.
pub struct OrderManager {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn SnapshotCache>,
    events: Arc<EventBus>,
    default_slippage: Decimal,
    cache_ttl: Duration,
}

impl OrderManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn SnapshotCache>,
        events: Arc<EventBus>,
        config: &ExecutionConfig,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            default_slippage: config.slippage_tolerance,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
        }
    }

    /// Validate and persist a new PENDING order.
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order> {
        request.validate()?;

        let order = Order::from_request(request, self.default_slippage);
        let order = self.store.insert(&order).await?;
        self.cache.put(order.id, &order, self.cache_ttl).await;

        info!(
            order_id = %order.id,
            order_type = %order.order_type,
            token_in = %order.token_in,
            token_out = %order.token_out,
            amount_in = %order.amount_in,
            "Order created"
        );
        Ok(order)
    }

    /// Read-through lookup: cache first, then the durable store, repopulating
    /// the cache on a miss.
    pub async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        if let Some(order) = self.cache.get(id).await {
            debug!(order_id = %id, "Cache hit");
            return Ok(Some(order));
        }

        let order = self.store.get(id).await?;
        if let Some(ref order) = order {
            self.cache.put(id, order, self.cache_ttl).await;
        }
        Ok(order)
    }

    /// Like `get_order`, but unknown ids are an error.
    pub async fn require_order(&self, id: Uuid) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound { order_id: id }.into())
    }

    /// Apply one state transition: validate the move, persist status and
    /// fields atomically, overwrite the cached snapshot, publish one event.
    pub async fn update_status(
        &self,
        id: Uuid,
        new_status: OrderStatus,
        fields: OrderUpdate,
        payload: Option<StatusPayload>,
    ) -> Result<Order> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or(OrderError::NotFound { order_id: id })?;

        if !current.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: current.status.to_string(),
                to: new_status.to_string(),
            }
            .into());
        }

        let updated = self.store.update_fields(id, new_status, &fields).await?;
        self.cache.put(id, &updated, self.cache_ttl).await;

        debug!(order_id = %id, from = %current.status, to = %new_status, "Order transitioned");
        self.events
            .publish(StatusUpdate::new(id, new_status, payload))
            .await;

        Ok(updated)
    }

    /// Order counts grouped by status, for the metrics endpoint.
    pub async fn status_counts(&self) -> Result<HashMap<OrderStatus, i64>> {
        self.store.counts_by_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryOrderStore};
    use crate::domain::OrderKind;
    use crate::error::SwapflowError;
    use rust_decimal_macros::dec;

    mockall::mock! {
        Store {}

        #[async_trait::async_trait]
        impl OrderStore for Store {
            async fn insert(&self, order: &Order) -> Result<Order>;
            async fn update_fields(
                &self,
                id: Uuid,
                status: OrderStatus,
                fields: &OrderUpdate,
            ) -> Result<Order>;
            async fn get(&self, id: Uuid) -> Result<Option<Order>>;
            async fn counts_by_status(&self) -> Result<HashMap<OrderStatus, i64>>;
        }
    }

    fn manager() -> (OrderManager, Arc<EventBus>) {
        let events = Arc::new(EventBus::default());
        let manager = OrderManager::new(
            Arc::new(MemoryOrderStore::new()),
            Arc::new(MemoryCache::new()),
            events.clone(),
            &ExecutionConfig::default(),
        );
        (manager, events)
    }

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(1),
            order_type: OrderKind::Market,
            slippage: None,
            limit_price: None,
            order_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_is_pending_with_defaults() {
        let (manager, _events) = manager();
        let order = manager.create_order(&request()).await.expect("create");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.retry_count, 0);
        assert_eq!(order.slippage, dec!(0.01));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request() {
        let (manager, _events) = manager();
        let mut bad = request();
        bad.amount_in = dec!(-3);
        assert!(manager.create_order(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_client_id_rejected() {
        let (manager, _events) = manager();
        let mut req = request();
        req.order_id = Some(Uuid::new_v4());

        manager.create_order(&req).await.expect("first create");
        let err = manager.create_order(&req).await.unwrap_err();
        assert!(err.to_string().contains("already queued"));
    }

    #[tokio::test]
    async fn test_update_status_publishes_exactly_one_event() {
        let (manager, events) = manager();
        let order = manager.create_order(&request()).await.expect("create");
        let mut rx = events.subscribe_order(order.id).await;

        manager
            .update_status(
                order.id,
                OrderStatus::Routing,
                OrderUpdate::default(),
                Some(StatusPayload::message("Comparing quotes")),
            )
            .await
            .expect("transition");

        let event = rx.recv().await.expect("event");
        assert_eq!(event.status, OrderStatus::Routing);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let (manager, _events) = manager();
        let order = manager.create_order(&request()).await.expect("create");

        let err = manager
            .update_status(
                order.id,
                OrderStatus::Confirmed,
                OrderUpdate::default(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid state transition"));
    }

    #[tokio::test]
    async fn test_update_unknown_order_is_not_found() {
        let (manager, _events) = manager();
        let err = manager
            .update_status(
                Uuid::new_v4(),
                OrderStatus::Routing,
                OrderUpdate::default(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_get_order_read_through() {
        let (manager, _events) = manager();
        let order = manager.create_order(&request()).await.expect("create");

        let fetched = manager.get_order(order.id).await.expect("get");
        assert_eq!(fetched.map(|o| o.id), Some(order.id));
        assert!(manager.get_order(Uuid::new_v4()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates_without_publishing() {
        let order = Order::from_request(&request(), dec!(0.01));
        let id = order.id;

        let mut store = MockStore::new();
        let snapshot = order.clone();
        store
            .expect_get()
            .returning(move |_| Ok(Some(snapshot.clone())));
        store
            .expect_update_fields()
            .returning(|_, _, _| Err(SwapflowError::Database(sqlx::Error::PoolTimedOut)));

        let events = Arc::new(EventBus::default());
        let manager = OrderManager::new(
            Arc::new(store),
            Arc::new(MemoryCache::new()),
            events.clone(),
            &ExecutionConfig::default(),
        );
        let mut rx = events.subscribe_order(id).await;

        let err = manager
            .update_status(id, OrderStatus::Routing, OrderUpdate::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        // A failed persist must not leak a status event.
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_cache_refreshed_on_transition() {
        let (manager, _events) = manager();
        let order = manager.create_order(&request()).await.expect("create");

        manager
            .update_status(
                order.id,
                OrderStatus::Routing,
                OrderUpdate::default(),
                None,
            )
            .await
            .expect("transition");

        // The cached snapshot must reflect the new status immediately.
        let fetched = manager.require_order(order.id).await.expect("get");
        assert_eq!(fetched.status, OrderStatus::Routing);
    }
}
