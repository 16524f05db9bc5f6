use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, Quote};

/// Event record describing one state transition.
///
/// Transient: delivered to live subscribers, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<StatusPayload>,
}

impl StatusUpdate {
    pub fn new(order_id: Uuid, status: OrderStatus, payload: Option<StatusPayload>) -> Self {
        Self {
            order_id,
            status,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Stage-specific details attached to a status update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_dex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotes: Option<Vec<Quote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_out: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusPayload {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_selected_dex(mut self, dex: impl Into<String>) -> Self {
        self.selected_dex = Some(dex.into());
        self
    }

    pub fn with_quotes(mut self, quotes: Vec<Quote>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn with_expected_output(mut self, amount: Decimal) -> Self {
        self.expected_output = Some(amount);
        self
    }

    pub fn with_result(mut self, tx_hash: String, price: Decimal, amount_out: Decimal) -> Self {
        self.tx_hash = Some(tx_hash);
        self.execution_price = Some(price);
        self.amount_out = Some(amount_out);
        self
    }

    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    pub fn with_error(mut self, text: impl Into<String>) -> Self {
        self.error = Some(text.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_skips_absent_fields() {
        let update = StatusUpdate::new(
            Uuid::new_v4(),
            OrderStatus::Routing,
            Some(StatusPayload::message("Comparing quotes")),
        );
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json["status"], "ROUTING");
        assert!(json.get("orderId").is_some());
        assert_eq!(json["payload"]["message"], "Comparing quotes");
        assert!(json["payload"].get("txHash").is_none());
        assert!(json["payload"].get("quotes").is_none());
    }

    #[test]
    fn test_update_without_payload_omits_field() {
        let update = StatusUpdate::new(Uuid::new_v4(), OrderStatus::Pending, None);
        let json = serde_json::to_value(&update).expect("serialize");
        assert!(json.get("payload").is_none());
    }
}
