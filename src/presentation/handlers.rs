// HTTP request handlers
use crate::application::telemetry_service::TelemetryService;
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::ndjson_stream::stream_from_subscription;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub mqtt_connected: bool,
    pub observers: usize,
    pub timestamp: DateTime<Utc>,
}

/// Frames pushed to WebSocket observers.
#[derive(Serialize)]
#[serde(tag = "event", content = "data")]
enum ObserverMessage<'a> {
    #[serde(rename = "dataUpdate")]
    DataUpdate(&'a Snapshot),
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mqtt_connected: state.ingestion_link.is_connected(),
        observers: state.telemetry_service.observer_count(),
        timestamp: Utc::now(),
    })
}

/// Current snapshot, identical in shape to what observers receive
pub async fn latest_snapshot(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let snapshot = state.telemetry_service.snapshot();
    match json_response(&snapshot, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Threshold classification of the current snapshot
pub async fn classification_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.telemetry_service.classification())
}

/// Stream snapshots as newline-delimited JSON
pub async fn stream_snapshots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_subscription(state.telemetry_service.subscribe())
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let service = state.telemetry_service.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: TelemetryService) {
    let mut subscription = service.subscribe();
    let observer = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.recv().await {
            let frame = match serde_json::to_string(&ObserverMessage::DataUpdate(&snapshot)) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(observer, "Failed to encode snapshot: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                tracing::debug!(observer, "WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Observers only listen; inbound frames are drained until the socket closes.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    service.unsubscribe(observer);
    tracing::info!(observer, "WebSocket client disconnected");
}
