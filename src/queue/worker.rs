//! Worker pool: bounded concurrent execution of queued jobs.
//!
//! A single dispatcher task claims jobs from the queue and spawns one task
//! per attempt, capped by the configured slot count and a sliding-window
//! rate limit on attempt starts. A job held back by the rate limit waits
//! for a slot; it is never dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::pipeline::ExecutionPipeline;
use crate::queue::job::Job;
use crate::queue::queue::{FailureAction, JobQueue};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Sliding window over recent attempt start times.
struct RateWindow {
    max_starts: u32,
    window: Duration,
    starts: VecDeque<Instant>,
}

impl RateWindow {
    fn new(max_starts: u32, window: Duration) -> Self {
        Self {
            max_starts,
            window,
            starts: VecDeque::new(),
        }
    }

    fn trim(&mut self, now: Instant) {
        while let Some(&start) = self.starts.front() {
            if now.duration_since(start) >= self.window {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }

    /// When the next slot frees up, or `None` if one is free now.
    fn next_free(&mut self, now: Instant) -> Option<Instant> {
        self.trim(now);
        if (self.starts.len() as u32) < self.max_starts {
            None
        } else {
            self.starts.front().map(|start| *start + self.window)
        }
    }

    fn record(&mut self, now: Instant) {
        self.starts.push_back(now);
    }
}

pub struct WorkerPool {
    queue: Arc<JobQueue>,
    pipeline: Arc<ExecutionPipeline>,
    max_concurrent: usize,
    max_starts_per_window: u32,
    drain_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        pipeline: Arc<ExecutionPipeline>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            pipeline,
            max_concurrent: config.max_concurrent_orders,
            max_starts_per_window: config.max_orders_per_minute,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        }
    }

    /// Dispatch loop. Runs until shutdown is signalled or the queue closes,
    /// then drains in-flight attempts within the drain deadline.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            slots = self.max_concurrent,
            rate_limit = self.max_starts_per_window,
            "Worker pool started"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut window = RateWindow::new(self.max_starts_per_window, RATE_WINDOW);

        'dispatch: loop {
            // Wait for a free slot before claiming more work.
            while tasks.len() >= self.max_concurrent {
                tokio::select! {
                    finished = tasks.join_next() => {
                        if let Some(Err(e)) = finished {
                            error!(error = %e, "Worker task panicked");
                        }
                    }
                    _ = shutdown.changed() => break 'dispatch,
                }
            }

            let job = tokio::select! {
                claimed = self.queue.next_ready() => match claimed {
                    Some(job) => job,
                    None => break 'dispatch,
                },
                _ = shutdown.changed() => break 'dispatch,
            };

            // Global rate limit on attempt starts: hold the job, never drop it.
            while let Some(free_at) = window.next_free(Instant::now()) {
                debug!(
                    order_id = %job.order_id,
                    wait_ms = free_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Rate limit reached; holding job"
                );
                tokio::select! {
                    _ = tokio::time::sleep_until(free_at) => {}
                    _ = shutdown.changed() => break 'dispatch,
                }
            }
            window.record(Instant::now());

            let queue = Arc::clone(&self.queue);
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move {
                process_job(queue, pipeline, job).await;
            });
        }

        self.drain(tasks).await;
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        if tasks.is_empty() {
            info!("Worker pool stopped; no attempts in flight");
            return;
        }

        info!(in_flight = tasks.len(), "Draining in-flight attempts");
        let deadline = tokio::time::sleep(self.drain_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                finished = tasks.join_next() => match finished {
                    Some(Err(e)) => error!(error = %e, "Worker task panicked"),
                    Some(Ok(())) => {}
                    None => {
                        info!("Worker pool stopped; all attempts finished");
                        break;
                    }
                },
                _ = &mut deadline => {
                    warn!(
                        abandoned = tasks.len(),
                        "Drain deadline passed; abandoning remaining attempts"
                    );
                    tasks.shutdown().await;
                    break;
                }
            }
        }
    }
}

async fn process_job(queue: Arc<JobQueue>, pipeline: Arc<ExecutionPipeline>, job: Job) {
    info!(
        order_id = %job.order_id,
        attempt = job.attempt,
        "Worker processing order"
    );

    match pipeline.run(job.order_id).await {
        Ok(order) => {
            queue.complete(order.id).await;
            info!(order_id = %order.id, status = %order.status, "Worker completed order");
        }
        Err(err) => match queue.fail(&job, &err).await {
            FailureAction::Retry(delay) => info!(
                order_id = %job.order_id,
                attempt = job.attempt,
                retry_in_ms = delay.as_millis() as u64,
                "Attempt failed; retry scheduled"
            ),
            FailureAction::Exhausted => error!(
                order_id = %job.order_id,
                attempts = job.attempt,
                error = %err,
                "Order failed; retry budget exhausted"
            ),
            FailureAction::Abandoned => error!(
                order_id = %job.order_id,
                error = %err,
                "Order failed permanently"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryCache, MemoryOrderStore};
    use crate::config::{ExecutionConfig, QueueConfig};
    use crate::domain::{CreateOrderRequest, OrderKind, OrderStatus};
    use crate::events::EventBus;
    use crate::orders::OrderManager;
    use crate::router::{Band, QuoteRouter, SimulatedProvider, VenueProfile};
    use rust_decimal_macros::dec;

    struct Harness {
        manager: Arc<OrderManager>,
        events: Arc<EventBus>,
        queue: Arc<JobQueue>,
        pool: Option<WorkerPool>,
    }

    fn harness(profile: VenueProfile, worker_config: WorkerConfig) -> Harness {
        let events = Arc::new(EventBus::default());
        let manager = Arc::new(OrderManager::new(
            Arc::new(MemoryOrderStore::new()),
            Arc::new(MemoryCache::new()),
            Arc::clone(&events),
            &ExecutionConfig::default(),
        ));
        let router =
            Arc::new(QuoteRouter::new().with_provider(Arc::new(SimulatedProvider::new(profile))));
        let pipeline = Arc::new(ExecutionPipeline::new(Arc::clone(&manager), router));
        let queue = Arc::new(JobQueue::new(&QueueConfig {
            max_retry_attempts: 3,
            backoff_base_ms: 2000,
            initial_delay_ms: 0,
        }));
        let pool = WorkerPool::new(Arc::clone(&queue), pipeline, &worker_config);
        Harness {
            manager,
            events,
            queue,
            pool: Some(pool),
        }
    }

    fn perfect_profile() -> VenueProfile {
        VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(0.0)
            .with_impact_band(Band::new(1.0, 0.0))
    }

    fn worker_config(slots: usize, per_minute: u32) -> WorkerConfig {
        WorkerConfig {
            max_concurrent_orders: slots,
            max_orders_per_minute: per_minute,
            drain_timeout_secs: 30,
        }
    }

    async fn create_market_order(manager: &OrderManager) -> uuid::Uuid {
        let request = CreateOrderRequest {
            token_in: "SOL".to_string(),
            token_out: "USDC".to_string(),
            amount_in: dec!(1),
            order_type: OrderKind::Market,
            slippage: Some(dec!(0.01)),
            limit_price: None,
            order_id: None,
        };
        manager.create_order(&request).await.unwrap().id
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_processes_queued_orders() {
        let mut harness = harness(perfect_profile(), worker_config(2, 100));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut all = harness.events.subscribe_all().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = create_market_order(&harness.manager).await;
            let order = harness.manager.require_order(id).await.unwrap();
            harness.queue.enqueue(&order).await.unwrap();
            ids.push(id);
        }

        let pool = harness.pool.take().unwrap();
        let pool_task = tokio::spawn(pool.run(shutdown_rx));

        let mut confirmed = 0;
        while confirmed < 3 {
            let update = all.recv().await.unwrap();
            if update.status == OrderStatus::Confirmed {
                confirmed += 1;
            }
        }

        shutdown_tx.send(true).unwrap();
        pool_task.await.unwrap();

        let metrics = harness.queue.metrics().await;
        assert_eq!(metrics.completed, 3);
        assert_eq!(metrics.failed, 0);
        for id in ids {
            let order = harness.manager.require_order(id).await.unwrap();
            assert_eq!(order.status, OrderStatus::Confirmed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_order_exhausts_retries() {
        let always_fails = VenueProfile::raydium()
            .without_latency()
            .with_failure_rate(1.0)
            .with_impact_band(Band::new(1.0, 0.0));
        let mut harness = harness(always_fails, worker_config(2, 100));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let id = create_market_order(&harness.manager).await;
        let order = harness.manager.require_order(id).await.unwrap();
        harness.queue.enqueue(&order).await.unwrap();

        let mut rx = harness.events.subscribe_order(id).await;
        let pool = harness.pool.take().unwrap();
        let pool_task = tokio::spawn(pool.run(shutdown_rx));

        let mut failures = 0;
        while failures < 3 {
            let update = rx.recv().await.unwrap();
            if update.status == OrderStatus::Failed {
                failures += 1;
            }
        }

        shutdown_tx.send(true).unwrap();
        pool_task.await.unwrap();

        let order = harness.manager.require_order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.retry_count, 3);

        let metrics = harness.queue.metrics().await;
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_attempt() {
        let slow = VenueProfile::raydium()
            .with_failure_rate(0.0)
            .with_impact_band(Band::new(1.0, 0.0));
        let mut harness = harness(slow, worker_config(2, 100));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let id = create_market_order(&harness.manager).await;
        let order = harness.manager.require_order(id).await.unwrap();
        harness.queue.enqueue(&order).await.unwrap();

        let mut rx = harness.events.subscribe_order(id).await;
        let pool = harness.pool.take().unwrap();
        let pool_task = tokio::spawn(pool.run(shutdown_rx));

        // Wait until the attempt is mid-execution, then shut down.
        loop {
            let update = rx.recv().await.unwrap();
            if update.status == OrderStatus::Submitted {
                break;
            }
        }
        shutdown_tx.send(true).unwrap();
        pool_task.await.unwrap();

        let order = harness.manager.require_order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_holds_second_start() {
        let mut harness = harness(perfect_profile(), worker_config(2, 1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let first = create_market_order(&harness.manager).await;
        let second = create_market_order(&harness.manager).await;
        for id in [first, second] {
            let order = harness.manager.require_order(id).await.unwrap();
            harness.queue.enqueue(&order).await.unwrap();
        }

        let mut all = harness.events.subscribe_all().await;
        let started = Instant::now();
        let pool = harness.pool.take().unwrap();
        let pool_task = tokio::spawn(pool.run(shutdown_rx));

        let mut confirmed = 0;
        while confirmed < 2 {
            let update = all.recv().await.unwrap();
            if update.status == OrderStatus::Confirmed {
                confirmed += 1;
            }
        }

        // Second start had to wait for the 60s window to roll over.
        assert!(started.elapsed() >= RATE_WINDOW);

        shutdown_tx.send(true).unwrap();
        pool_task.await.unwrap();
    }
}
