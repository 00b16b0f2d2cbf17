// Snapshot domain model
use super::telemetry::{Channel, Reading};
use super::thresholds::ThresholdConfig;
use serde::Serialize;
use std::collections::BTreeMap;

/// Immutable copy of the store taken at one instant. This is the exact
/// shape pushed to observers and returned by the query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub latest: BTreeMap<Channel, Reading>,
    /// Oldest-first, one entry per known channel even when empty.
    pub historical: BTreeMap<Channel, Vec<Reading>>,
    pub config: ThresholdConfig,
}

impl Snapshot {
    /// Snapshot of a store that has never received data.
    pub fn empty(config: ThresholdConfig) -> Self {
        Self {
            latest: BTreeMap::new(),
            historical: Channel::ALL.into_iter().map(|c| (c, Vec::new())).collect(),
            config,
        }
    }

    pub fn latest_value(&self, channel: Channel) -> Option<f64> {
        self.latest.get(&channel).map(|r| r.value)
    }

    #[cfg(test)]
    pub fn history(&self, channel: Channel) -> &[Reading] {
        self.historical
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_snapshot_lists_every_channel() {
        let snapshot = Snapshot::empty(ThresholdConfig::default());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["latest"], serde_json::json!({}));
        for channel in Channel::ALL {
            assert_eq!(json["historical"][channel.wire_name()], serde_json::json!([]));
        }
        assert_eq!(json["config"]["tempMax"], 30.0);
    }

    #[test]
    fn test_reading_shape() {
        let mut snapshot = Snapshot::empty(ThresholdConfig::default());
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        snapshot.latest.insert(Channel::Tds, Reading::new(120.0, ts));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["latest"]["tds"]["value"], 120.0);
        assert_eq!(json["latest"]["tds"]["timestamp"], "2025-03-01T12:00:00Z");
        assert_eq!(snapshot.latest_value(Channel::Tds), Some(120.0));
        assert_eq!(snapshot.latest_value(Channel::Turbidity), None);
    }
}
