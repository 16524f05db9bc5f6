//! Simulated venue used in place of live DEX connectivity.
//!
//! Each venue is described by a [`VenueProfile`]: a base price, a uniform
//! price band sampled per quote, a fee taken off the output, and execution
//! characteristics (latency, fill impact, failure rate). Profiles for the
//! built-in venues mirror observed devnet behaviour.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::sleep;

use crate::domain::{ExecutionResult, Quote};
use crate::error::{OrderError, Result};
use crate::router::provider::{ExecutionRequest, Provider};

/// Alphabet for mock transaction signatures (base58, no 0/O/I/l).
const SIGNATURE_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Solana transaction signatures are 64 bytes, 88 characters in base58.
const SIGNATURE_LEN: usize = 88;

/// Uniform multiplier range `[low, low + width)`.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub low: f64,
    pub width: f64,
}

impl Band {
    pub const fn new(low: f64, width: f64) -> Self {
        Self { low, width }
    }

    fn sample(&self) -> f64 {
        self.low + rand::thread_rng().gen::<f64>() * self.width
    }
}

/// Behavioural parameters for a simulated venue.
#[derive(Debug, Clone)]
pub struct VenueProfile {
    pub name: String,
    pub base_price: Decimal,
    /// Quoted price is `base_price` scaled by a sample from this band.
    pub price_band: Band,
    /// Fee fraction taken off the output amount.
    pub fee: Decimal,
    pub liquidity: Decimal,
    pub estimated_slippage: Decimal,
    pub quote_latency: Duration,
    pub execution_latency: Duration,
    /// Extra random latency added on top of `execution_latency`.
    pub execution_jitter: Duration,
    /// Fill amount is `expected_out` scaled by a sample from this band.
    pub impact_band: Band,
    /// Probability that execution fails after passing the slippage check.
    pub failure_rate: f64,
}

impl VenueProfile {
    pub fn raydium() -> Self {
        Self {
            name: "Raydium".to_string(),
            base_price: dec!(100),
            price_band: Band::new(0.98, 0.04),
            fee: dec!(0.003),
            liquidity: dec!(50000),
            estimated_slippage: dec!(0.002),
            quote_latency: Duration::from_millis(200),
            execution_latency: Duration::from_millis(2000),
            execution_jitter: Duration::from_millis(1000),
            impact_band: Band::new(0.998, 0.004),
            failure_rate: 0.05,
        }
    }

    pub fn meteora() -> Self {
        Self {
            name: "Meteora".to_string(),
            base_price: dec!(100),
            price_band: Band::new(0.97, 0.05),
            fee: dec!(0.002),
            liquidity: dec!(75000),
            estimated_slippage: dec!(0.001),
            quote_latency: Duration::from_millis(200),
            execution_latency: Duration::from_millis(2000),
            execution_jitter: Duration::from_millis(1000),
            impact_band: Band::new(0.998, 0.004),
            failure_rate: 0.05,
        }
    }

    /// Strip all simulated latency. Intended for tests and local runs.
    pub fn without_latency(mut self) -> Self {
        self.quote_latency = Duration::ZERO;
        self.execution_latency = Duration::ZERO;
        self.execution_jitter = Duration::ZERO;
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }

    pub fn with_impact_band(mut self, band: Band) -> Self {
        self.impact_band = band;
        self
    }

    pub fn with_price_band(mut self, band: Band) -> Self {
        self.price_band = band;
        self
    }
}

/// In-process venue driven by a [`VenueProfile`].
pub struct SimulatedProvider {
    profile: VenueProfile,
}

impl SimulatedProvider {
    pub fn new(profile: VenueProfile) -> Self {
        Self { profile }
    }

    pub fn raydium() -> Self {
        Self::new(VenueProfile::raydium())
    }

    pub fn meteora() -> Self {
        Self::new(VenueProfile::meteora())
    }

    pub fn profile(&self) -> &VenueProfile {
        &self.profile
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn id(&self) -> &str {
        &self.profile.name
    }

    async fn quote(&self, _token_in: &str, _token_out: &str, amount_in: Decimal) -> Result<Quote> {
        sleep(self.profile.quote_latency).await;

        let price = self.profile.base_price * decimal_multiplier(self.profile.price_band.sample());
        let amount_out = amount_in * price * (Decimal::ONE - self.profile.fee);

        Ok(Quote {
            provider: self.profile.name.clone(),
            price,
            amount_out,
            fee: self.profile.fee,
            liquidity: self.profile.liquidity,
            estimated_slippage: self.profile.estimated_slippage,
        })
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let jitter = self
            .profile
            .execution_jitter
            .mul_f64(rand::thread_rng().gen::<f64>());
        sleep(self.profile.execution_latency + jitter).await;

        let impact = decimal_multiplier(self.profile.impact_band.sample());
        let amount_out = request.expected_out * impact;

        if request.expected_out > Decimal::ZERO {
            let shortfall = (request.expected_out - amount_out) / request.expected_out;
            if shortfall > request.max_slippage {
                return Err(OrderError::SlippageExceeded {
                    limit: request.max_slippage,
                    actual: shortfall,
                }
                .into());
            }
        }

        if rand::thread_rng().gen::<f64>() < self.profile.failure_rate {
            return Err(OrderError::Execution("Transaction simulation failed".to_string()).into());
        }

        let execution_price = if request.amount_in.is_zero() {
            Decimal::ZERO
        } else {
            amount_out / request.amount_in
        };

        Ok(ExecutionResult {
            tx_hash: mock_signature(),
            execution_price,
            amount_out,
            provider: self.profile.name.clone(),
            timestamp: Utc::now(),
        })
    }
}

fn decimal_multiplier(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ONE)
}

/// Random string shaped like a Solana transaction signature.
fn mock_signature() -> String {
    let mut rng = rand::thread_rng();
    (0..SIGNATURE_LEN)
        .map(|_| SIGNATURE_ALPHABET[rng.gen_range(0..SIGNATURE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwapflowError;

    fn request(expected_out: Decimal, max_slippage: Decimal) -> ExecutionRequest {
        ExecutionRequest {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(1),
            expected_out,
            max_slippage,
        }
    }

    #[tokio::test]
    async fn test_quote_price_within_band() {
        let provider = SimulatedProvider::new(VenueProfile::raydium().without_latency());
        let quote = provider.quote("SOL", "USDC", dec!(1)).await.unwrap();

        assert_eq!(quote.provider, "Raydium");
        assert!(quote.price >= dec!(98));
        assert!(quote.price <= dec!(102));
        assert_eq!(quote.fee, dec!(0.003));
        assert_eq!(quote.liquidity, dec!(50000));
    }

    #[tokio::test]
    async fn test_quote_applies_fee_to_output() {
        let provider = SimulatedProvider::new(VenueProfile::meteora().without_latency());
        let amount_in = dec!(10);
        let quote = provider.quote("SOL", "USDC", amount_in).await.unwrap();

        let expected = amount_in * quote.price * (Decimal::ONE - dec!(0.002));
        assert_eq!(quote.amount_out, expected);
    }

    #[tokio::test]
    async fn test_execute_fills_within_impact_band() {
        let profile = VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(0.0);
        let provider = SimulatedProvider::new(profile);

        let result = provider
            .execute(&request(dec!(100), dec!(0.01)))
            .await
            .unwrap();

        assert!(result.amount_out >= dec!(99.8));
        assert!(result.amount_out <= dec!(100.2));
        assert_eq!(result.tx_hash.len(), 88);
        assert_eq!(result.provider, "Raydium");
    }

    #[tokio::test]
    async fn test_execute_rejects_excess_slippage() {
        let profile = VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(0.0)
            .with_impact_band(Band::new(0.9, 0.0));
        let provider = SimulatedProvider::new(profile);

        let err = provider
            .execute(&request(dec!(100), dec!(0.01)))
            .await
            .unwrap_err();

        match err {
            SwapflowError::Order(OrderError::SlippageExceeded { limit, actual }) => {
                assert_eq!(limit, dec!(0.01));
                assert!(actual > dec!(0.09));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_simulated_failure() {
        let profile = VenueProfile::meteora()
            .without_latency()
            .with_failure_rate(1.0)
            .with_impact_band(Band::new(1.0, 0.0));
        let provider = SimulatedProvider::new(profile);

        let err = provider
            .execute(&request(dec!(100), dec!(0.01)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SwapflowError::Order(OrderError::Execution(_))
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_execution_price_is_fill_over_input() {
        let profile = VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(0.0)
            .with_impact_band(Band::new(1.0, 0.0));
        let provider = SimulatedProvider::new(profile);

        let mut req = request(dec!(200), dec!(0.01));
        req.amount_in = dec!(2);
        let result = provider.execute(&req).await.unwrap();

        assert_eq!(result.amount_out, dec!(200));
        assert_eq!(result.execution_price, dec!(100));
    }
}
