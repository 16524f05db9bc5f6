use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::{state::AppState, types::*};
use crate::domain::CreateOrderRequest;
use crate::error::{OrderError, SwapflowError};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: SwapflowError) -> ApiError {
    let status = match &err {
        SwapflowError::Order(order_err) => match order_err {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::DuplicateJob { .. } => StatusCode::CONFLICT,
            OrderError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

/// POST /api/orders/execute
///
/// Persists a PENDING order and hands it to the queue. Execution happens
/// asynchronously; the caller follows progress over the stream URL in the
/// response or by polling the order.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> std::result::Result<Json<CreateOrderResponse>, ApiError> {
    let order = state
        .manager
        .create_order(&request)
        .await
        .map_err(error_response)?;
    state.queue.enqueue(&order).await.map_err(error_response)?;

    Ok(Json(CreateOrderResponse::for_order(&order)))
}

/// GET /api/orders/:order_id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> std::result::Result<Json<OrderResponse>, ApiError> {
    match state
        .manager
        .get_order(order_id)
        .await
        .map_err(error_response)?
    {
        Some(order) => Ok(Json(OrderResponse {
            success: true,
            order,
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Order not found")),
        )),
    }
}

/// GET /api/metrics
pub async fn get_metrics(
    State(state): State<AppState>,
) -> std::result::Result<Json<MetricsResponse>, ApiError> {
    let metrics = state.queue.metrics().await;
    let orders = state
        .manager
        .status_counts()
        .await
        .map_err(error_response)?;

    Ok(Json(MetricsResponse {
        success: true,
        metrics,
        orders,
        timestamp: Utc::now(),
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}
