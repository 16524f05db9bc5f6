use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, OrderUpdate};
use crate::error::{OrderError, Result};
use crate::orders::{OrderStore, SnapshotCache};

/// In-memory order store. Backs the test suites and local development runs
/// that have no database at hand.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<DashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<Order> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(OrderError::DuplicateJob { order_id: order.id }.into()),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(order.clone())
            }
        }
    }

    async fn update_fields(
        &self,
        id: Uuid,
        status: OrderStatus,
        fields: &OrderUpdate,
    ) -> Result<Order> {
        let mut entry = self
            .orders
            .get_mut(&id)
            .ok_or(OrderError::NotFound { order_id: id })?;

        let order = entry.value_mut();
        order.status = status;
        fields.apply(order);
        order.updated_at = Utc::now();
        if status == OrderStatus::Confirmed && order.confirmed_at.is_none() {
            order.confirmed_at = Some(order.updated_at);
        }

        Ok(order.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.get(&id).map(|entry| entry.clone()))
    }

    async fn counts_by_status(&self) -> Result<HashMap<OrderStatus, i64>> {
        let mut counts = HashMap::new();
        for entry in self.orders.iter() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

struct CachedOrder {
    order: Order,
    expires_at: Instant,
}

/// In-memory snapshot cache with per-entry TTL, evicted lazily on read.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<Uuid, CachedOrder>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, id: Uuid) -> Option<Order> {
        let expired = match self.entries.get(&id) {
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    return Some(entry.order.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            self.entries.remove(&id);
        }
        None
    }

    async fn put(&self, id: Uuid, order: &Order, ttl: Duration) {
        self.entries.insert(
            id,
            CachedOrder {
                order: order.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
