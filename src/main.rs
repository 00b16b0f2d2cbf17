// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::telemetry_service::TelemetryService;
use crate::application::telemetry_source::TelemetrySource;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::mqtt_ingestion::MqttIngestion;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let app_config = load_app_config().context("Failed to load configuration")?;

    // Create the store and broadcaster (application layer)
    let telemetry_service =
        TelemetryService::new(app_config.thresholds.clone(), app_config.broadcast.observer_queue);

    // Start ingestion (infrastructure layer)
    let ingestion = Arc::new(MqttIngestion::new(app_config.mqtt.clone()));
    let ingestion_link = ingestion.link();
    {
        let ingestion = ingestion.clone();
        let service = telemetry_service.clone();
        tokio::spawn(async move {
            if let Err(e) = ingestion.run(service).await {
                tracing::error!("MQTT ingestion stopped: {:#}", e);
            }
        });
    }

    // Create application state
    let state = Arc::new(AppState {
        telemetry_service,
        ingestion_link,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting tank-telemetry service on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
