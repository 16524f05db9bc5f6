//! In-process job queue: two-tier priority, per-order dedup, delayed retry.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::domain::Order;
use crate::error::{OrderError, Result, SwapflowError};
use crate::queue::job::{Job, JobPriority};

/// Wraps a job for the ready heap.
#[derive(Debug)]
struct PrioritizedJob {
    job: Job,
    sequence: u64,
}

impl PartialEq for PrioritizedJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.sequence == other.sequence
    }
}

impl Eq for PrioritizedJob {}

impl PartialOrd for PrioritizedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower priority value dequeues first; equal priorities go FIFO.
        match other.job.priority.cmp(&self.job.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

#[derive(Debug)]
struct DelayedJob {
    job: Job,
    ready_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Waiting,
    Delayed,
    Active,
}

/// What the queue decided after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Scheduled to run again after the given backoff delay.
    Retry(Duration),
    /// Retry budget spent; the job is terminally failed.
    Exhausted,
    /// Error class is permanent; not retried regardless of remaining budget.
    Abandoned,
}

/// Live and cumulative job counts, shaped for the metrics endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub waiting: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub delayed: usize,
}

impl std::fmt::Display for QueueMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Jobs[waiting={}, active={}, delayed={}, completed={}, failed={}]",
            self.waiting, self.active, self.delayed, self.completed, self.failed
        )
    }
}

#[derive(Default)]
struct QueueInner {
    ready: BinaryHeap<PrioritizedJob>,
    delayed: Vec<DelayedJob>,
    states: HashMap<Uuid, JobState>,
    sequence: u64,
    completed: u64,
    failed: u64,
    closed: bool,
}

impl QueueInner {
    fn push_ready(&mut self, job: Job) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.states.insert(job.order_id, JobState::Waiting);
        self.ready.push(PrioritizedJob { job, sequence });
    }

    /// Move every due delayed job onto the ready heap.
    fn promote_due(&mut self, now: Instant) {
        let mut idx = 0;
        while idx < self.delayed.len() {
            if self.delayed[idx].ready_at <= now {
                let entry = self.delayed.swap_remove(idx);
                self.push_ready(entry.job);
            } else {
                idx += 1;
            }
        }
    }

    fn next_wakeup(&self) -> Option<Instant> {
        self.delayed.iter().map(|d| d.ready_at).min()
    }

    fn active_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == JobState::Active)
            .count()
    }
}

/// Order execution queue.
///
/// At most one job may exist per order id across the waiting, delayed and
/// active states; an id becomes eligible again only after its job completes
/// or terminally fails. Failed attempts are retried with exponential backoff
/// while the error is retryable and budget remains.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    wakeup: Notify,
    max_attempts: u32,
    backoff_base: Duration,
    initial_delay: Duration,
}

impl JobQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            wakeup: Notify::new(),
            max_attempts: config.max_retry_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }

    /// Queue an order for execution.
    ///
    /// Market orders are placed in the higher-priority tier. The configured
    /// initial delay keeps the job out of dispatch long enough for the caller
    /// to attach a status stream before the first transition fires.
    pub async fn enqueue(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(OrderError::QueueClosed.into());
        }
        if inner.states.contains_key(&order.id) {
            return Err(OrderError::DuplicateJob { order_id: order.id }.into());
        }

        let job = Job::new(order.id, JobPriority::for_kind(order.order_type));
        if self.initial_delay.is_zero() {
            inner.push_ready(job);
        } else {
            inner.states.insert(order.id, JobState::Delayed);
            inner.delayed.push(DelayedJob {
                job,
                ready_at: Instant::now() + self.initial_delay,
            });
        }
        debug!(order_id = %order.id, "Job enqueued");
        self.wakeup.notify_one();
        Ok(())
    }

    /// Wait for and claim the next dispatchable job.
    ///
    /// Returns `None` once the queue has been closed. Jobs already claimed
    /// are unaffected; their `complete`/`fail` calls still land.
    pub async fn next_ready(&self) -> Option<Job> {
        loop {
            let wait_until = {
                let mut inner = self.inner.lock().await;
                if inner.closed {
                    return None;
                }
                inner.promote_due(Instant::now());
                if let Some(prioritized) = inner.ready.pop() {
                    let mut job = prioritized.job;
                    job.attempt += 1;
                    inner.states.insert(job.order_id, JobState::Active);
                    return Some(job);
                }
                inner.next_wakeup()
            };

            match wait_until {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = self.wakeup.notified() => {}
                    }
                }
                None => self.wakeup.notified().await,
            }
        }
    }

    /// Acknowledge a successfully finished job, freeing its order id.
    pub async fn complete(&self, order_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.states.remove(&order_id);
        inner.completed += 1;
        debug!(order_id = %order_id, "Job completed");
    }

    /// Record a failed attempt and decide whether the job runs again.
    pub async fn fail(&self, job: &Job, error: &SwapflowError) -> FailureAction {
        let mut inner = self.inner.lock().await;

        if !error.is_retryable() {
            inner.states.remove(&job.order_id);
            inner.failed += 1;
            warn!(
                order_id = %job.order_id,
                attempt = job.attempt,
                error = %error,
                "Job abandoned; error is not retryable"
            );
            return FailureAction::Abandoned;
        }

        if job.attempt >= self.max_attempts {
            inner.states.remove(&job.order_id);
            inner.failed += 1;
            warn!(
                order_id = %job.order_id,
                attempts = job.attempt,
                error = %error,
                "Retry budget exhausted"
            );
            return FailureAction::Exhausted;
        }

        // Backoff doubles per completed attempt: base, 2x, 4x...
        let delay = self.backoff_base * 2u32.pow(job.attempt.saturating_sub(1));
        inner.states.insert(job.order_id, JobState::Delayed);
        inner.delayed.push(DelayedJob {
            job: job.clone(),
            ready_at: Instant::now() + delay,
        });
        self.wakeup.notify_one();
        debug!(
            order_id = %job.order_id,
            attempt = job.attempt,
            delay_ms = delay.as_millis() as u64,
            "Job scheduled for retry"
        );
        FailureAction::Retry(delay)
    }

    pub async fn metrics(&self) -> QueueMetrics {
        let inner = self.inner.lock().await;
        QueueMetrics {
            waiting: inner.ready.len(),
            active: inner.active_count(),
            completed: inner.completed,
            failed: inner.failed,
            delayed: inner.delayed.len(),
        }
    }

    /// Stop intake and dispatch. Active jobs run to completion; waiting and
    /// delayed jobs are dropped with the process.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        self.wakeup.notify_waiters();
        debug!("Job queue closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}
