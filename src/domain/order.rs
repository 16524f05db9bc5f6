use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrderError;

/// Order kind requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
    Limit,
    Sniper,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
            OrderKind::Sniper => "sniper",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderKind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "market" => Ok(OrderKind::Market),
            "limit" => Ok(OrderKind::Limit),
            "sniper" => Ok(OrderKind::Sniper),
            _ => Err(format!("Unknown order kind: {}", s)),
        }
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Order accepted, waiting for a worker
    Pending,
    /// Comparing quotes across providers
    Routing,
    /// Best route chosen, building the transaction
    Building,
    /// Sent to the selected provider for execution
    Submitted,
    /// Executed successfully (terminal)
    Confirmed,
    /// Attempt failed (terminal for the order record)
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Routing => "ROUTING",
            OrderStatus::Building => "BUILDING",
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Legal forward moves of the lifecycle. FAILED -> ROUTING is the retry
    /// re-entry edge: a new attempt restarts routing on an order whose
    /// previous attempt failed. CONFIRMED has no outgoing edges.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Routing)
            | (Routing, Building)
            | (Building, Submitted)
            | (Submitted, Confirmed) => true,
            (Pending | Routing | Building | Submitted, Failed) => true,
            (Failed, Routing) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "ROUTING" => Ok(OrderStatus::Routing),
            "BUILDING" => Ok(OrderStatus::Building),
            "SUBMITTED" => Ok(OrderStatus::Submitted),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "FAILED" => Ok(OrderStatus::Failed),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Order creation request (what the client asks for)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub order_type: OrderKind,
    #[serde(default)]
    pub slippage: Option<Decimal>,
    /// Target price for limit orders. Stored with the order but not acted
    /// on until limit execution lands.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Client-supplied id; generated server-side when absent.
    #[serde(default)]
    pub order_id: Option<Uuid>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> std::result::Result<(), OrderError> {
        if self.token_in.trim().is_empty() {
            return Err(OrderError::Validation("tokenIn must not be empty".into()));
        }
        if self.token_out.trim().is_empty() {
            return Err(OrderError::Validation("tokenOut must not be empty".into()));
        }
        if self.token_in == self.token_out {
            return Err(OrderError::Validation(
                "tokenIn and tokenOut must differ".into(),
            ));
        }
        if self.amount_in <= Decimal::ZERO {
            return Err(OrderError::Validation("amountIn must be positive".into()));
        }
        if let Some(slippage) = self.slippage {
            if slippage < Decimal::ZERO || slippage > Decimal::ONE {
                return Err(OrderError::Validation(
                    "slippage must be a fraction within [0, 1]".into(),
                ));
            }
        }
        if let Some(limit_price) = self.limit_price {
            if limit_price <= Decimal::ZERO {
                return Err(OrderError::Validation(
                    "limitPrice must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Order (tracked through its lifecycle)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_type: OrderKind,
    pub status: OrderStatus,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    pub amount_out: Option<Decimal>,
    pub slippage: Decimal,
    pub limit_price: Option<Decimal>,
    pub selected_dex: Option<String>,
    pub execution_price: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn from_request(request: &CreateOrderRequest, default_slippage: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: request.order_id.unwrap_or_else(Uuid::new_v4),
            order_type: request.order_type,
            status: OrderStatus::Pending,
            token_in: request.token_in.clone(),
            token_out: request.token_out.clone(),
            amount_in: request.amount_in,
            amount_out: None,
            slippage: request.slippage.unwrap_or(default_slippage),
            limit_price: request.limit_price,
            selected_dex: None,
            execution_price: None,
            tx_hash: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Field patch applied together with a status transition
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub amount_out: Option<Decimal>,
    pub selected_dex: Option<String>,
    pub execution_price: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: Option<i32>,
}

impl OrderUpdate {
    pub fn is_empty(&self) -> bool {
        self.amount_out.is_none()
            && self.selected_dex.is_none()
            && self.execution_price.is_none()
            && self.tx_hash.is_none()
            && self.error_message.is_none()
            && self.retry_count.is_none()
    }

    /// Apply the patch to an in-memory order record.
    pub fn apply(&self, order: &mut Order) {
        if let Some(amount_out) = self.amount_out {
            order.amount_out = Some(amount_out);
        }
        if let Some(ref selected_dex) = self.selected_dex {
            order.selected_dex = Some(selected_dex.clone());
        }
        if let Some(execution_price) = self.execution_price {
            order.execution_price = Some(execution_price);
        }
        if let Some(ref tx_hash) = self.tx_hash {
            order.tx_hash = Some(tx_hash.clone());
        }
        if let Some(ref error_message) = self.error_message {
            order.error_message = Some(error_message.clone());
        }
        if let Some(retry_count) = self.retry_count {
            order.retry_count = retry_count;
        }
    }
}
