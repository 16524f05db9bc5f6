use thiserror::Error;

/// Main error type for the execution service
#[derive(Error, Debug)]
pub enum SwapflowError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Order lifecycle errors
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapflowError {
    /// Whether the queue should schedule another attempt after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            SwapflowError::Order(err) => err.is_retryable(),
            // Transient infrastructure faults get another attempt.
            SwapflowError::Database(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for SwapflowError
pub type Result<T> = std::result::Result<T, SwapflowError>;

/// Specific error types for order execution
#[derive(Error, Debug, Clone)]
pub enum OrderError {
    #[error("Order not found: {order_id}")]
    NotFound { order_id: uuid::Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Price slippage exceeded: limit {limit}, actual {actual}")]
    SlippageExceeded {
        limit: rust_decimal::Decimal,
        actual: rust_decimal::Decimal,
    },

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Routing failed: {0}")]
    Routing(String),

    #[error("Invalid state transition: from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job already queued for order: {order_id}")]
    DuplicateJob { order_id: uuid::Uuid },

    #[error("Unsupported order kind: {kind}")]
    UnsupportedKind { kind: String },

    #[error("Queue is closed")]
    QueueClosed,
}

impl OrderError {
    /// Retryable errors terminate the attempt but leave the job eligible for
    /// the queue's backoff schedule. Everything else fails the job outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderError::SlippageExceeded { .. }
                | OrderError::Execution(_)
                | OrderError::Routing(_)
        )
    }
}
