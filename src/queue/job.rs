use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::OrderKind;

/// Two-tier scheduling priority. Lower value is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    Market = 1,
    Standard = 2,
}

impl JobPriority {
    pub fn for_kind(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Market => JobPriority::Market,
            _ => JobPriority::Standard,
        }
    }
}

/// One queued execution attempt for an order.
///
/// Carries no order snapshot: the pipeline re-reads the order at the start of
/// every attempt, so a retry sees the retry count written by the previous one.
#[derive(Debug, Clone)]
pub struct Job {
    pub order_id: Uuid,
    pub priority: JobPriority,
    /// 1-based attempt number, assigned when the job is dispatched.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(order_id: Uuid, priority: JobPriority) -> Self {
        Self {
            order_id,
            priority,
            attempt: 0,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_orders_get_higher_priority() {
        assert_eq!(JobPriority::for_kind(OrderKind::Market), JobPriority::Market);
        assert_eq!(JobPriority::for_kind(OrderKind::Limit), JobPriority::Standard);
        assert_eq!(
            JobPriority::for_kind(OrderKind::Sniper),
            JobPriority::Standard
        );
        assert!(JobPriority::Market < JobPriority::Standard);
    }
}
