use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::dispatcher::{Dispatcher, RunSummary};
use crate::errors::AppError;

/// Shared state for the operational endpoints.
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "flat-notifier",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/dispatch/run
///
/// Performs one dispatch run outside the schedule. Answers 409 when a run is
/// already in progress.
pub async fn trigger_dispatch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunSummary>, AppError> {
    tracing::info!("=== Manual dispatch run requested ===");
    let summary = state.dispatcher.try_run().await?;
    Ok(Json(summary))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/dispatch/run", post(trigger_dispatch))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
