use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP/WebSocket API
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "postgres://localhost/swapflow".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum execution attempts per job before it fails terminally
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Base delay for exponential retry backoff (doubles per attempt)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Delay before a freshly enqueued job becomes eligible
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: default_max_retry_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent execution slots
    #[serde(default = "default_max_concurrent_orders")]
    pub max_concurrent_orders: usize,
    /// Sliding-window throughput cap shared across all slots
    #[serde(default = "default_max_orders_per_minute")]
    pub max_orders_per_minute: u32,
    /// How long graceful shutdown waits for in-flight attempts
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

fn default_max_concurrent_orders() -> usize {
    10
}

fn default_max_orders_per_minute() -> u32 {
    100
}

fn default_drain_timeout_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_orders: default_max_concurrent_orders(),
            max_orders_per_minute: default_max_orders_per_minute(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Slippage tolerance applied when the request does not specify one
    #[serde(default = "default_slippage_tolerance")]
    pub slippage_tolerance: Decimal,
    /// TTL for cached order snapshots
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_slippage_tolerance() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_tolerance: default_slippage_tolerance(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
            execution: ExecutionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("database.url", default_database_url())?
            .set_default("database.max_connections", default_max_connections() as i64)?
            .set_default(
                "queue.max_retry_attempts",
                default_max_retry_attempts() as i64,
            )?
            .set_default("queue.backoff_base_ms", default_backoff_base_ms() as i64)?
            .set_default("queue.initial_delay_ms", default_initial_delay_ms() as i64)?
            .set_default(
                "worker.max_concurrent_orders",
                default_max_concurrent_orders() as i64,
            )?
            .set_default(
                "worker.max_orders_per_minute",
                default_max_orders_per_minute() as i64,
            )?
            .set_default(
                "worker.drain_timeout_secs",
                default_drain_timeout_secs() as i64,
            )?
            .set_default("execution.slippage_tolerance", 0.01)?
            .set_default("execution.cache_ttl_secs", default_cache_ttl_secs() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SWAPFLOW_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SWAPFLOW_WORKER__MAX_CONCURRENT_ORDERS, etc.)
            .add_source(
                Environment::with_prefix("SWAPFLOW")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.worker.max_concurrent_orders == 0 {
            errors.push("worker.max_concurrent_orders must be at least 1".to_string());
        }

        if self.worker.max_orders_per_minute == 0 {
            errors.push("worker.max_orders_per_minute must be at least 1".to_string());
        }

        if self.queue.max_retry_attempts == 0 {
            errors.push("queue.max_retry_attempts must be at least 1".to_string());
        }

        if self.queue.backoff_base_ms == 0 {
            errors.push("queue.backoff_base_ms must be positive".to_string());
        }

        if self.execution.slippage_tolerance < Decimal::ZERO
            || self.execution.slippage_tolerance > Decimal::ONE
        {
            errors.push("execution.slippage_tolerance must be between 0 and 1".to_string());
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
