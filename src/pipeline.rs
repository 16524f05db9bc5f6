//! End-to-end execution of a single order.
//!
//! One run drives an order through ROUTING, BUILDING and SUBMITTED to a
//! terminal CONFIRMED or FAILED, publishing a status event at every
//! transition. A run always starts from a fresh read of the order, so a
//! retried order picks up the retry count recorded by its previous attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Order, OrderKind, OrderStatus, OrderUpdate, StatusPayload};
use crate::error::{OrderError, Result, SwapflowError};
use crate::orders::OrderManager;
use crate::router::{ExecutionRequest, QuoteRouter};

/// Pause after entering ROUTING so streaming clients observe the phase.
const ROUTING_PACE: Duration = Duration::from_millis(300);
/// Pause after entering BUILDING.
const BUILDING_PACE: Duration = Duration::from_millis(800);

const EXPLORER_BASE: &str = "https://explorer.solana.com/tx";

pub struct ExecutionPipeline {
    manager: Arc<OrderManager>,
    router: Arc<QuoteRouter>,
}

impl ExecutionPipeline {
    pub fn new(manager: Arc<OrderManager>, router: Arc<QuoteRouter>) -> Self {
        Self { manager, router }
    }

    /// Run one execution attempt for the given order.
    ///
    /// On failure the order is marked FAILED with the retry count bumped and
    /// the error is returned, so the queue can decide whether to retry.
    pub async fn run(&self, order_id: Uuid) -> Result<Order> {
        let order = self.manager.require_order(order_id).await?;
        let previous_retries = order.retry_count;

        if order.order_type != OrderKind::Market {
            let err: SwapflowError = OrderError::UnsupportedKind {
                kind: order.order_type.to_string(),
            }
            .into();
            self.mark_failed(order_id, previous_retries, &err).await;
            return Err(err);
        }

        match self.execute_market(&order).await {
            Ok(confirmed) => Ok(confirmed),
            Err(err) => {
                self.mark_failed(order_id, previous_retries, &err).await;
                Err(err)
            }
        }
    }

    async fn execute_market(&self, order: &Order) -> Result<Order> {
        let order_id = order.id;

        self.manager
            .update_status(
                order_id,
                OrderStatus::Routing,
                OrderUpdate::default(),
                Some(StatusPayload::message(format!(
                    "Comparing prices across {} venues...",
                    self.router.provider_count()
                ))),
            )
            .await?;
        tokio::time::sleep(ROUTING_PACE).await;

        let selection = self
            .router
            .best_quote(&order.token_in, &order.token_out, order.amount_in)
            .await?;
        let venue = selection.best.provider.clone();
        info!(
            order_id = %order_id,
            venue = %venue,
            expected_out = %selection.best.amount_out,
            quotes = selection.all.len(),
            "Routing decision"
        );

        self.manager
            .update_status(
                order_id,
                OrderStatus::Building,
                OrderUpdate {
                    selected_dex: Some(venue.clone()),
                    ..Default::default()
                },
                Some(
                    StatusPayload::message(format!("Building transaction for {venue}..."))
                        .with_selected_dex(venue.clone())
                        .with_expected_output(selection.best.amount_out)
                        .with_quotes(selection.all.clone()),
                ),
            )
            .await?;
        tokio::time::sleep(BUILDING_PACE).await;

        self.manager
            .update_status(
                order_id,
                OrderStatus::Submitted,
                OrderUpdate::default(),
                Some(
                    StatusPayload::message(format!("Transaction submitted via {venue}..."))
                        .with_selected_dex(venue.clone()),
                ),
            )
            .await?;

        let request = ExecutionRequest {
            token_in: order.token_in.clone(),
            token_out: order.token_out.clone(),
            amount_in: order.amount_in,
            expected_out: selection.best.amount_out,
            max_slippage: order.slippage,
        };
        let result = self.router.execute_on(&venue, &request).await?;

        let confirmed = self
            .manager
            .update_status(
                order_id,
                OrderStatus::Confirmed,
                OrderUpdate {
                    amount_out: Some(result.amount_out),
                    execution_price: Some(result.execution_price),
                    tx_hash: Some(result.tx_hash.clone()),
                    ..Default::default()
                },
                Some(
                    StatusPayload::message("Transaction confirmed!")
                        .with_selected_dex(venue)
                        .with_result(
                            result.tx_hash.clone(),
                            result.execution_price,
                            result.amount_out,
                        )
                        .with_explorer_url(format!(
                            "{EXPLORER_BASE}/{}?cluster=devnet",
                            result.tx_hash
                        )),
                ),
            )
            .await?;

        info!(order_id = %order_id, tx_hash = %result.tx_hash, "Order confirmed");
        Ok(confirmed)
    }

    /// Record a failed attempt. Errors here are logged rather than returned
    /// so the original execution error stays the one reported upstream.
    async fn mark_failed(&self, order_id: Uuid, previous_retries: i32, err: &SwapflowError) {
        let message = err.to_string();
        let update = OrderUpdate {
            error_message: Some(message.clone()),
            retry_count: Some(previous_retries + 1),
            ..Default::default()
        };
        let payload = StatusPayload::message(format!("Order failed: {message}")).with_error(message);

        if let Err(update_err) = self
            .manager
            .update_status(order_id, OrderStatus::Failed, update, Some(payload))
            .await
        {
            error!(
                order_id = %order_id,
                error = %update_err,
                "Could not record order failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryOrderStore};
    use crate::config::ExecutionConfig;
    use crate::domain::CreateOrderRequest;
    use crate::events::EventBus;
    use crate::router::{Band, SimulatedProvider, VenueProfile};
    use rust_decimal_macros::dec;

    fn perfect_venue(profile: VenueProfile) -> Arc<SimulatedProvider> {
        Arc::new(SimulatedProvider::new(
            profile
                .without_latency()
                .with_failure_rate(0.0)
                .with_impact_band(Band::new(1.0, 0.0)),
        ))
    }

    fn setup(router: QuoteRouter) -> (Arc<OrderManager>, Arc<EventBus>, ExecutionPipeline) {
        let events = Arc::new(EventBus::default());
        let manager = Arc::new(OrderManager::new(
            Arc::new(MemoryOrderStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::clone(&events),
            &ExecutionConfig::default(),
        ));
        let pipeline = ExecutionPipeline::new(Arc::clone(&manager), Arc::new(router));
        (manager, events, pipeline)
    }

    fn market_request() -> CreateOrderRequest {
        CreateOrderRequest {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(1),
            order_type: OrderKind::Market,
            slippage: Some(dec!(0.01)),
            limit_price: None,
            order_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_market_order_reaches_confirmed() {
        let router = QuoteRouter::new()
            .with_provider(perfect_venue(VenueProfile::raydium()))
            .with_provider(perfect_venue(VenueProfile::meteora()));
        let (manager, events, pipeline) = setup(router);

        let order = manager.create_order(&market_request()).await.unwrap();
        let mut rx = events.subscribe_order(order.id).await;

        let confirmed = pipeline.run(order.id).await.unwrap();

        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert!(confirmed.tx_hash.is_some());
        assert!(confirmed.execution_price.is_some());
        assert!(confirmed.amount_out.is_some());
        assert!(confirmed.selected_dex.is_some());
        assert!(confirmed.confirmed_at.is_some());
        assert_eq!(confirmed.retry_count, 0);

        let mut statuses = Vec::new();
        while let Ok(update) = rx.try_recv() {
            statuses.push(update.status);
        }
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Routing,
                OrderStatus::Building,
                OrderStatus::Submitted,
                OrderStatus::Confirmed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_event_carries_result_fields() {
        let router = QuoteRouter::new().with_provider(perfect_venue(VenueProfile::raydium()));
        let (manager, events, pipeline) = setup(router);

        let order = manager.create_order(&market_request()).await.unwrap();
        let mut rx = events.subscribe_order(order.id).await;
        pipeline.run(order.id).await.unwrap();

        let mut last = None;
        while let Ok(update) = rx.try_recv() {
            last = Some(update);
        }
        let confirmed = last.expect("confirmed event");
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let payload = confirmed.payload.expect("payload");
        assert!(payload.tx_hash.is_some());
        assert!(payload.execution_price.is_some());
        assert!(payload.amount_out.is_some());
        assert!(payload.explorer_url.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_building_event_carries_all_quotes() {
        let router = QuoteRouter::new()
            .with_provider(perfect_venue(VenueProfile::raydium()))
            .with_provider(perfect_venue(VenueProfile::meteora()));
        let (manager, events, pipeline) = setup(router);

        let order = manager.create_order(&market_request()).await.unwrap();
        let mut rx = events.subscribe_order(order.id).await;
        pipeline.run(order.id).await.unwrap();

        let mut building = None;
        while let Ok(update) = rx.try_recv() {
            if update.status == OrderStatus::Building {
                building = Some(update);
            }
        }
        let payload = building.expect("building event").payload.expect("payload");
        assert_eq!(payload.quotes.expect("quotes").len(), 2);
        assert!(payload.expected_output.is_some());
        assert!(payload.selected_dex.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_market_order_fails_without_routing() {
        let router = QuoteRouter::new().with_provider(perfect_venue(VenueProfile::raydium()));
        let (manager, events, pipeline) = setup(router);

        let mut request = market_request();
        request.order_type = OrderKind::Limit;
        let order = manager.create_order(&request).await.unwrap();
        let mut rx = events.subscribe_order(order.id).await;

        let err = pipeline.run(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            SwapflowError::Order(OrderError::UnsupportedKind { .. })
        ));
        assert!(!err.is_retryable());

        let failed = manager.require_order(order.id).await.unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert!(failed.error_message.is_some());

        let update = rx.try_recv().unwrap();
        assert_eq!(update.status, OrderStatus::Failed);
        assert!(update.payload.unwrap().error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slippage_failure_marks_failed_and_bumps_retries() {
        let bad_fill = VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(0.0)
            .with_impact_band(Band::new(0.9, 0.0));
        let router = QuoteRouter::new().with_provider(Arc::new(SimulatedProvider::new(bad_fill)));
        let (manager, _events, pipeline) = setup(router);

        let order = manager.create_order(&market_request()).await.unwrap();
        let err = pipeline.run(order.id).await.unwrap_err();

        assert!(matches!(
            err,
            SwapflowError::Order(OrderError::SlippageExceeded { .. })
        ));
        assert!(err.is_retryable());

        let failed = manager.require_order(order.id).await.unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_order_can_be_rerun_and_confirm() {
        let router = QuoteRouter::new().with_provider(perfect_venue(VenueProfile::raydium()));
        let (manager, _events, pipeline) = setup(router);

        let order = manager.create_order(&market_request()).await.unwrap();

        // First attempt failed previously; the order sits FAILED with one retry.
        manager
            .update_status(
                order.id,
                OrderStatus::Failed,
                OrderUpdate {
                    error_message: Some("Transaction simulation failed".to_string()),
                    retry_count: Some(1),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let confirmed = pipeline.run(order.id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_order_is_not_marked_failed() {
        let router = QuoteRouter::new().with_provider(perfect_venue(VenueProfile::raydium()));
        let (_manager, _events, pipeline) = setup(router);

        let err = pipeline.run(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            SwapflowError::Order(OrderError::NotFound { .. })
        ));
    }
}
