use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use swapflow::adapters::{MemoryCache, PostgresOrderStore};
use swapflow::api::{create_router, AppState};
use swapflow::config::AppConfig;
use swapflow::coordination::{listen_for_signals, GracefulShutdown};
use swapflow::error::{Result, SwapflowError};
use swapflow::events::EventBus;
use swapflow::orders::OrderManager;
use swapflow::pipeline::ExecutionPipeline;
use swapflow::queue::{JobQueue, WorkerPool};
use swapflow::router::{QuoteRouter, SimulatedProvider};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swapflow")]
#[command(version = "0.1.0")]
#[command(about = "Asynchronous order execution and routing service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the execution service (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config);

    if let Err(problems) = config.validate() {
        for problem in &problems {
            error!("Invalid configuration: {}", problem);
        }
        return Err(SwapflowError::Internal(
            "configuration validation failed".to_string(),
        ));
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_service(config).await,
        Commands::Migrate => run_migrations(config).await,
    }
}

async fn run_migrations(config: AppConfig) -> Result<()> {
    let store =
        PostgresOrderStore::connect(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    info!("Migrations applied");
    Ok(())
}

async fn run_service(config: AppConfig) -> Result<()> {
    info!("Starting swapflow execution service");

    // Storage: durable rows in Postgres, snapshots in the in-process cache.
    let store = Arc::new(
        PostgresOrderStore::connect(&config.database.url, config.database.max_connections).await?,
    );
    store.migrate().await?;
    let cache = Arc::new(MemoryCache::new());

    // Core wiring.
    let events = Arc::new(EventBus::default());
    let manager = Arc::new(OrderManager::new(
        store,
        cache,
        events.clone(),
        &config.execution,
    ));

    let mut router = QuoteRouter::new();
    router.register(Arc::new(SimulatedProvider::raydium()));
    router.register(Arc::new(SimulatedProvider::meteora()));
    let router = Arc::new(router);

    let pipeline = Arc::new(ExecutionPipeline::new(manager.clone(), router));
    let queue = Arc::new(JobQueue::new(&config.queue));
    let pool = WorkerPool::new(queue.clone(), pipeline, &config.worker);

    let shutdown = Arc::new(GracefulShutdown::new(Duration::from_secs(
        config.worker.drain_timeout_secs,
    )));
    listen_for_signals(shutdown.clone());

    let pool_handle = tokio::spawn(pool.run(shutdown.trigger_receiver()));

    // HTTP/WebSocket surface.
    let state = AppState::new(manager, queue.clone(), events.clone());
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| SwapflowError::Internal(format!("Invalid bind address: {}", e)))?;
    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", addr);

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.wait_for_trigger().await })
            .await
    });

    shutdown.wait_for_trigger().await;

    // Ordered teardown: refuse new jobs, let in-flight attempts finish, then
    // close the streams so subscribers see the drained orders' final states.
    let queue_close = queue.clone();
    let events_close = events.clone();
    shutdown
        .execute(
            move || Box::pin(async move { queue_close.close().await }),
            move || {
                Box::pin(async move {
                    if let Err(e) = pool_handle.await {
                        warn!("Worker pool task ended abnormally: {}", e);
                    }
                })
            },
            move || Box::pin(async move { events_close.close().await }),
        )
        .await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("API server exited with error: {}", e),
        Err(e) => warn!("API server task panicked: {}", e),
    }

    info!("Service stopped");
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
