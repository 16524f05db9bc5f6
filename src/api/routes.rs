use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{
    handlers,
    state::AppState,
    websocket::{global_stream_handler, order_stream_handler},
};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Order endpoints
        .route("/api/orders/execute", post(handlers::create_order))
        .route("/api/orders/:order_id", get(handlers::get_order))
        // Queue metrics
        .route("/api/metrics", get(handlers::get_metrics))
        // Health check
        .route("/health", get(handlers::health))
        // WebSocket streams (the static /stream segment wins over :order_id)
        .route("/api/orders/stream", get(global_stream_handler))
        .route("/api/orders/:order_id/stream", get(order_stream_handler))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
