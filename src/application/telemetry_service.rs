// Telemetry service - Ingest, query and fan-out use cases
use crate::application::broadcaster::{Broadcaster, ObserverId, Subscription};
use crate::application::telemetry_store::TelemetryStore;
use crate::domain::classification::{classify, Classification};
use crate::domain::snapshot::Snapshot;
use crate::domain::telemetry::Channel;
use crate::domain::thresholds::ThresholdConfig;
use crate::infrastructure::sensor_payload::{parse_sensor_payload, PayloadError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone)]
pub struct TelemetryService {
    store: Arc<TelemetryStore>,
    broadcaster: Arc<Broadcaster>,
    // Apply and publish happen as one step so observers see updates in order.
    ingest_lock: Arc<Mutex<()>>,
}

impl TelemetryService {
    pub fn new(thresholds: ThresholdConfig, observer_queue: usize) -> Self {
        let store = TelemetryStore::new(thresholds);
        let broadcaster = Broadcaster::new(store.snapshot(), observer_queue);
        Self {
            store: Arc::new(store),
            broadcaster: Arc::new(broadcaster),
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Decodes one inbound message and applies it. Returns the number of
    /// channels that were updated.
    pub fn ingest(&self, payload: &[u8], timestamp: DateTime<Utc>) -> Result<usize, PayloadError> {
        let values = parse_sensor_payload(payload)?;
        Ok(self.ingest_values(&values, timestamp))
    }

    pub fn ingest_values(&self, values: &[(Channel, f64)], timestamp: DateTime<Utc>) -> usize {
        if values.is_empty() {
            tracing::debug!("Message carried no recognized readings, nothing to publish");
            return 0;
        }

        let _guard = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let applied = self.store.apply_batch(values, timestamp);
        let delivered = self.broadcaster.publish(self.store.snapshot());

        tracing::info!(
            channels = applied,
            observers = delivered,
            "Data updated at {}",
            timestamp.format("%H:%M:%S")
        );
        applied
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn classification(&self) -> Classification {
        classify(&self.store.snapshot())
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.register()
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.broadcaster.unregister(id)
    }

    pub fn observer_count(&self) -> usize {
        self.broadcaster.observer_count()
    }
}
