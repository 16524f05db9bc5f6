use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, OrderUpdate};
use crate::error::Result;

/// Durable order storage port
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order. Rejects an id that already exists with
    /// `OrderError::DuplicateJob`.
    async fn insert(&self, order: &Order) -> Result<Order>;

    /// Set the status plus a field patch in one atomic update and return the
    /// refreshed row. Fails with `OrderError::NotFound` for unknown ids.
    async fn update_fields(
        &self,
        id: Uuid,
        status: OrderStatus,
        fields: &OrderUpdate,
    ) -> Result<Order>;

    /// Fetch one order.
    async fn get(&self, id: Uuid) -> Result<Option<Order>>;

    /// Count orders grouped by status.
    async fn counts_by_status(&self) -> Result<HashMap<OrderStatus, i64>>;
}

/// Read-through snapshot cache port.
///
/// Pure optimization: a miss falls back to the durable store, a write
/// overwrites whatever was there. Implementations swallow their own faults.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<Order>;

    async fn put(&self, id: Uuid, order: &Order, ttl: Duration);
}
