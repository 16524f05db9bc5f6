//! Concurrent quote fan-out and best-venue selection.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::{ExecutionResult, Quote};
use crate::error::{OrderError, Result};
use crate::router::provider::{ExecutionRequest, Provider};

/// Outcome of a quote round: the winning quote plus every quote gathered.
#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub best: Quote,
    pub all: Vec<Quote>,
}

/// Registry of venues, queried concurrently for every routing decision.
pub struct QuoteRouter {
    providers: Vec<Arc<dyn Provider>>,
}

impl QuoteRouter {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Quote all venues in parallel and pick the highest output amount.
    ///
    /// Venues that fail to quote are skipped with a warning. Ties go to the
    /// venue registered first.
    pub async fn best_quote(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Result<RouteSelection> {
        if self.providers.is_empty() {
            return Err(OrderError::Routing("no venues registered".to_string()).into());
        }

        let outcomes = join_all(self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            async move {
                let outcome = provider.quote(token_in, token_out, amount_in).await;
                (provider.id().to_string(), outcome)
            }
        }))
        .await;

        let mut all = Vec::with_capacity(outcomes.len());
        for (venue, outcome) in outcomes {
            match outcome {
                Ok(quote) => all.push(quote),
                Err(e) => warn!(venue = %venue, error = %e, "quote failed"),
            }
        }

        let mut best_idx: Option<usize> = None;
        for (idx, quote) in all.iter().enumerate() {
            let better = match best_idx {
                Some(current) => quote.amount_out > all[current].amount_out,
                None => true,
            };
            if better {
                best_idx = Some(idx);
            }
        }

        let best = match best_idx {
            Some(idx) => all[idx].clone(),
            None => {
                return Err(OrderError::Routing("all venues failed to quote".to_string()).into())
            }
        };

        debug!(
            venue = %best.provider,
            amount_out = %best.amount_out,
            quotes = all.len(),
            "selected best quote"
        );

        Ok(RouteSelection { best, all })
    }

    /// Execute on the named venue.
    pub async fn execute_on(
        &self,
        venue: &str,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.id() == venue)
            .ok_or_else(|| OrderError::Routing(format!("unknown venue: {venue}")))?;
        provider.execute(request).await
    }
}

impl Default for QuoteRouter {
    fn default() -> Self {
        Self::new()
    }
}
