use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, StatusPayload, StatusUpdate};
use crate::queue::QueueMetrics;

// ============================================================================
// Order Types
// ============================================================================

/// Response for POST /api/orders/execute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub message: String,
    pub websocket_url: String,
}

impl CreateOrderResponse {
    pub fn for_order(order: &Order) -> Self {
        Self {
            success: true,
            order_id: order.id,
            status: order.status,
            message: "Order created. Connect to WebSocket for live updates.".to_string(),
            websocket_url: format!("/api/orders/{}/stream", order.id),
        }
    }
}

/// Response for GET /api/orders/:order_id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

// ============================================================================
// Metrics / Health Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub success: bool,
    pub metrics: QueueMetrics,
    /// Order rows per lifecycle status, straight from the store.
    pub orders: HashMap<OrderStatus, i64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Error Types
// ============================================================================

/// JSON body for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// ============================================================================
// Stream Frame Types
// ============================================================================

/// Envelope for every server-to-client frame on the stream endpoints.
///
/// Optional fields are omitted when absent, so a pong is just
/// `{"type":"pong","timestamp":...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<StatusPayload>,
    pub timestamp: DateTime<Utc>,
}

impl WsFrame {
    /// Greeting sent once per connection, before any updates.
    pub fn connected(order_id: Option<Uuid>) -> Self {
        Self {
            kind: "connected",
            order_id,
            status: None,
            message: Some("WebSocket connected. Listening for order updates...".to_string()),
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// One forwarded bus event. Keeps the publish timestamp, not the
    /// forwarding time.
    pub fn status_update(update: StatusUpdate) -> Self {
        Self {
            kind: "status_update",
            order_id: Some(update.order_id),
            status: Some(update.status),
            message: None,
            data: update.payload,
            timestamp: update.timestamp,
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: "pong",
            order_id: None,
            status: None,
            message: None,
            data: None,
            timestamp: Utc::now(),
        }
    }
}
