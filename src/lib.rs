pub mod adapters;
pub mod api;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod events;
pub mod orders;
pub mod pipeline;
pub mod queue;
pub mod router;

pub use api::{create_router, AppState};
pub use config::AppConfig;
pub use coordination::{listen_for_signals, GracefulShutdown, ShutdownPhase};
pub use domain::{
    CreateOrderRequest, ExecutionResult, Order, OrderKind, OrderStatus, OrderUpdate, Quote,
    StatusPayload, StatusUpdate,
};
pub use error::{OrderError, Result, SwapflowError};
pub use events::EventBus;
pub use orders::{OrderManager, OrderStore, SnapshotCache};
pub use pipeline::ExecutionPipeline;
pub use queue::{FailureAction, Job, JobPriority, JobQueue, QueueMetrics, WorkerPool};
pub use router::{ExecutionRequest, Provider, QuoteRouter, RouteSelection, SimulatedProvider};
