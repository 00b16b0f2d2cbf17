// Application state for HTTP handlers
use crate::application::telemetry_service::TelemetryService;
use crate::application::telemetry_source::IngestionLink;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub telemetry_service: TelemetryService,
    pub ingestion_link: Arc<dyn IngestionLink>,
}
