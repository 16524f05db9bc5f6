//! Job queue and worker pool for asynchronous order execution.

pub mod job;
pub mod queue;
pub mod worker;

pub use job::{Job, JobPriority};
pub use queue::{FailureAction, JobQueue, QueueMetrics};
pub use worker::WorkerPool;
