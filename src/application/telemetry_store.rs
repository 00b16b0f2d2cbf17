// Telemetry store - Bounded history and latest reading per channel
use crate::domain::channel_buffer::ChannelBuffer;
use crate::domain::snapshot::Snapshot;
use crate::domain::telemetry::{Channel, Reading, SensorEvent};
use crate::domain::thresholds::ThresholdConfig;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct StoreState {
    buffers: BTreeMap<Channel, ChannelBuffer>,
    latest: BTreeMap<Channel, Reading>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            buffers: Channel::ALL
                .into_iter()
                .map(|c| (c, ChannelBuffer::new()))
                .collect(),
            latest: BTreeMap::new(),
        }
    }

    fn apply(&mut self, event: SensorEvent) -> Reading {
        let buffer = self.buffers.entry(event.channel).or_default();
        let mut reading = event.reading();
        // Keep the history non-decreasing even if producers race on timestamps.
        if let Some(tail) = buffer.last() {
            if reading.timestamp < tail.timestamp {
                tracing::debug!(
                    channel = %event.channel,
                    "Reading older than buffer tail, raising timestamp"
                );
                reading.timestamp = tail.timestamp;
            }
        }
        buffer.push(reading);
        self.latest.insert(event.channel, reading);
        reading
    }
}

/// In-memory store shared by the ingestion path and every reader. A single
/// lock covers buffers and latest values, so a snapshot never shows a
/// channel whose history and latest reading disagree.
pub struct TelemetryStore {
    state: Mutex<StoreState>,
    config: ThresholdConfig,
}

impl TelemetryStore {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            state: Mutex::new(StoreState::new()),
            config,
        }
    }

    #[cfg(test)]
    pub fn apply(&self, event: SensorEvent) -> Reading {
        self.lock().apply(event)
    }

    /// Applies a reading addressed by wire name. Unknown channels are
    /// dropped and reported as `None`.
    #[cfg(test)]
    pub fn apply_named(&self, channel: &str, value: f64, timestamp: DateTime<Utc>) -> Option<Reading> {
        let Some(channel) = Channel::from_wire_name(channel) else {
            tracing::debug!(channel, "Ignoring reading for unknown channel");
            return None;
        };
        Some(self.apply(SensorEvent::new(channel, value, timestamp)))
    }

    /// Applies several readings that arrived in one message, sharing a
    /// timestamp. Returns how many readings were stored.
    pub fn apply_batch(&self, values: &[(Channel, f64)], timestamp: DateTime<Utc>) -> usize {
        let mut state = self.lock();
        for (channel, value) in values {
            state.apply(SensorEvent::new(*channel, *value, timestamp));
        }
        values.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            latest: state.latest.clone(),
            historical: state
                .buffers
                .iter()
                .map(|(channel, buffer)| (*channel, buffer.to_vec()))
                .collect(),
            config: self.config.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panic while holding the lock cannot leave a half-applied reading
        // behind, so the state is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
