// Source traits for inbound telemetry
use crate::application::telemetry_service::TelemetryService;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Connection state as reported by the ingestion side. The core never
/// derives this itself.
pub trait IngestionLink: Send + Sync {
    fn is_connected(&self) -> bool;
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Feeds inbound messages into the service until the source shuts down.
    async fn run(&self, service: TelemetryService) -> anyhow::Result<()>;

    /// Handle the health endpoint uses to report connectivity.
    fn link(&self) -> Arc<dyn IngestionLink>;
}

/// Shared flag flipped by a source as its connection comes and goes.
#[derive(Debug, Default)]
pub struct LinkStatus {
    connected: AtomicBool,
}

impl LinkStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            tracing::info!(connected, "Ingestion link state changed");
        }
    }
}

impl IngestionLink for LinkStatus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
