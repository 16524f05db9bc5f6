use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::events::EventBus;
use crate::orders::OrderManager;
use crate::queue::JobQueue;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Order lifecycle owner (create, lookup, transitions)
    pub manager: Arc<OrderManager>,

    /// Intake queue feeding the worker pool
    pub queue: Arc<JobQueue>,

    /// Status fan-out hub backing the stream endpoints
    pub events: Arc<EventBus>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(manager: Arc<OrderManager>, queue: Arc<JobQueue>, events: Arc<EventBus>) -> Self {
        Self {
            manager,
            queue,
            events,
            start_time: Utc::now(),
        }
    }

    /// Get system uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
