// Route table for the HTTP surface
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    classification_status, health_check, latest_snapshot, stream_snapshots, ws_handler,
};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/latest", get(latest_snapshot))
        .route("/api/status", get(classification_status))
        .route("/api/stream", get(stream_snapshots))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
