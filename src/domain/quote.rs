use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candidate execution terms from one provider.
///
/// Ephemeral: used to pick a provider and to report routing metadata in
/// status updates, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub provider: String,
    pub price: Decimal,
    pub amount_out: Decimal,
    pub fee: Decimal,
    pub liquidity: Decimal,
    pub estimated_slippage: Decimal,
}

/// Outcome of submitting an order to the chosen provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub tx_hash: String,
    pub execution_price: Decimal,
    pub amount_out: Decimal,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}
