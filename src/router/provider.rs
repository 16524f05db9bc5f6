//! Venue abstraction for quoting and executing swaps.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{ExecutionResult, Quote};
use crate::error::Result;

/// Instruction to execute a swap at previously quoted terms.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: Decimal,
    /// Output promised by the winning quote. Fills are checked against this.
    pub expected_out: Decimal,
    /// Maximum tolerated shortfall, as a fraction of `expected_out`.
    pub max_slippage: Decimal,
}

/// A swap venue that can price and execute orders.
///
/// Implementations must be safe to call concurrently; the router quotes all
/// registered providers in parallel.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable venue name, used for routing decisions and order records.
    fn id(&self) -> &str;

    /// Price the given swap without committing to it.
    async fn quote(&self, token_in: &str, token_out: &str, amount_in: Decimal) -> Result<Quote>;

    /// Execute a swap previously quoted by this venue.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;
}
