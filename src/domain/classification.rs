// Threshold classification of a snapshot
use super::snapshot::Snapshot;
use super::telemetry::Channel;
use super::thresholds::ThresholdConfig;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fill percentage under which the tank is reported as critically low.
const LOW_LEVEL_DANGER_PCT: f64 = 20.0;
/// Fill percentage under which the tank is reported as moderate.
const LOW_LEVEL_WARNING_PCT: f64 = 50.0;
/// Fraction of the turbidity ceiling at which clarity becomes a warning.
const TURBIDITY_WARNING_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub value: f64,
}

impl ChannelStatus {
    fn normal(value: f64) -> Self {
        Self {
            status: Status::Normal,
            message: None,
            value,
        }
    }

    fn flagged(status: Status, message: impl Into<String>, value: f64) -> Self {
        Self {
            status,
            message: Some(message.into()),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaterLevel {
    /// Litres, rounded to the nearest whole litre.
    pub volume: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TankIntegrity {
    Good,
    Compromised,
    Normal,
}

/// Per-channel alert state derived from one snapshot. Channels missing
/// from the snapshot are simply absent here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub channels: BTreeMap<Channel, ChannelStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_level: Option<WaterLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tank_integrity: Option<TankIntegrity>,
}

impl Classification {
    #[cfg(test)]
    pub fn status(&self, channel: Channel) -> Option<Status> {
        self.channels.get(&channel).map(|s| s.status)
    }
}

pub fn classify(snapshot: &Snapshot) -> Classification {
    let config = &snapshot.config;
    let mut channels = BTreeMap::new();

    let water_temp = snapshot.latest_value(Channel::WaterTemperature);
    if let Some(value) = water_temp {
        channels.insert(Channel::WaterTemperature, classify_water_temperature(value, config));
    }

    let water_level = snapshot.latest_value(Channel::Distance).map(|distance| {
        let level = water_level(distance, config);
        channels.insert(Channel::Distance, classify_water_level(distance, &level));
        level
    });

    if let Some(value) = snapshot.latest_value(Channel::Turbidity) {
        channels.insert(Channel::Turbidity, classify_turbidity(value, config));
    }

    if let Some(value) = snapshot.latest_value(Channel::Tds) {
        channels.insert(Channel::Tds, classify_tds(value, config));
    }

    let tank_integrity = match (snapshot.latest_value(Channel::AmbientTemperature), water_temp) {
        (Some(ambient), Some(water)) => Some(tank_integrity(ambient, water, config)),
        _ => None,
    };

    Classification {
        channels,
        water_level,
        tank_integrity,
    }
}

/// Piecewise-linear volume between the full and empty sensor distances.
pub fn water_volume(distance: f64, config: &ThresholdConfig) -> f64 {
    if distance <= config.distance_full {
        return config.tank_total_volume;
    }
    // Also covers distance_empty <= distance_full, so the span below is never zero.
    if distance >= config.distance_empty {
        return 0.0;
    }
    let span = config.distance_empty - config.distance_full;
    let fraction = 1.0 - (distance - config.distance_full) / span;
    (config.tank_total_volume * fraction).round()
}

pub fn water_level(distance: f64, config: &ThresholdConfig) -> WaterLevel {
    let volume = water_volume(distance, config);
    let percentage = (100.0 * volume / config.tank_total_volume).round();
    WaterLevel { volume, percentage }
}

fn classify_water_temperature(value: f64, config: &ThresholdConfig) -> ChannelStatus {
    if value > config.temp_max {
        ChannelStatus::flagged(Status::Danger, "Water is too hot", value)
    } else if value < config.temp_min {
        ChannelStatus::flagged(Status::Danger, "Water is too cold", value)
    } else {
        ChannelStatus::normal(value)
    }
}

fn classify_water_level(distance: f64, level: &WaterLevel) -> ChannelStatus {
    if level.percentage < LOW_LEVEL_DANGER_PCT {
        ChannelStatus::flagged(
            Status::Danger,
            format!("Water level is critically low ({}%)", level.percentage),
            distance,
        )
    } else if level.percentage < LOW_LEVEL_WARNING_PCT {
        ChannelStatus::flagged(
            Status::Warning,
            format!("Water level is moderate ({}%)", level.percentage),
            distance,
        )
    } else {
        ChannelStatus::normal(distance)
    }
}

fn classify_turbidity(value: f64, config: &ThresholdConfig) -> ChannelStatus {
    // Raw readings can be negative (uncalibrated probe); they are compared as-is.
    if value > config.turbidity_threshold {
        ChannelStatus::flagged(Status::Danger, "Water is turbid", value)
    } else if value > config.turbidity_threshold * TURBIDITY_WARNING_RATIO {
        ChannelStatus::flagged(Status::Warning, "Water clarity is moderate", value)
    } else {
        ChannelStatus::normal(value)
    }
}

fn classify_tds(value: f64, config: &ThresholdConfig) -> ChannelStatus {
    if value < config.tds_min {
        ChannelStatus::flagged(Status::Danger, "TDS is below the safe minimum", value)
    } else if value > config.tds_max {
        ChannelStatus::flagged(Status::Danger, "TDS exceeds the safe maximum", value)
    } else {
        ChannelStatus::normal(value)
    }
}

fn tank_integrity(ambient: f64, water: f64, config: &ThresholdConfig) -> TankIntegrity {
    if ambient > config.outside_temp_max && water > config.temp_max {
        TankIntegrity::Compromised
    } else if ambient > config.outside_temp_max && water < config.temp_max {
        TankIntegrity::Good
    } else {
        TankIntegrity::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::Reading;
    use chrono::Utc;

    fn snapshot_with(values: &[(Channel, f64)]) -> Snapshot {
        let mut snapshot = Snapshot::empty(ThresholdConfig::default());
        let now = Utc::now();
        for (channel, value) in values {
            let reading = Reading::new(*value, now);
            snapshot.latest.insert(*channel, reading);
            snapshot.historical.insert(*channel, vec![reading]);
        }
        snapshot
    }

    #[test]
    fn test_volume_boundaries() {
        let config = ThresholdConfig::default();
        assert_eq!(water_volume(1.0, &config), 1000.0);
        assert_eq!(water_volume(0.5, &config), 1000.0);
        assert_eq!(water_volume(11.0, &config), 0.0);
        assert_eq!(water_volume(20.0, &config), 0.0);
        assert_eq!(water_volume(6.0, &config), 500.0);
        assert_eq!(water_level(6.0, &config).percentage, 50.0);
    }

    #[test]
    fn test_volume_with_degenerate_geometry() {
        let config = ThresholdConfig {
            distance_full: 5.0,
            distance_empty: 5.0,
            ..ThresholdConfig::default()
        };
        assert_eq!(water_volume(5.0, &config), 1000.0);
        assert_eq!(water_volume(5.1, &config), 0.0);
    }

    #[test]
    fn test_water_temperature_bounds() {
        let classification = classify(&snapshot_with(&[(Channel::WaterTemperature, 14.0)]));
        let status = &classification.channels[&Channel::WaterTemperature];
        assert_eq!(status.status, Status::Danger);
        assert_eq!(status.message.as_deref(), Some("Water is too cold"));

        let classification = classify(&snapshot_with(&[(Channel::WaterTemperature, 30.0)]));
        assert_eq!(classification.status(Channel::WaterTemperature), Some(Status::Normal));

        let classification = classify(&snapshot_with(&[(Channel::WaterTemperature, 30.01)]));
        let status = &classification.channels[&Channel::WaterTemperature];
        assert_eq!(status.status, Status::Danger);
        assert_eq!(status.message.as_deref(), Some("Water is too hot"));
    }

    #[test]
    fn test_water_level_status() {
        let classification = classify(&snapshot_with(&[(Channel::Distance, 10.0)]));
        assert_eq!(classification.status(Channel::Distance), Some(Status::Danger));
        assert_eq!(
            classification.water_level,
            Some(WaterLevel { volume: 100.0, percentage: 10.0 })
        );

        let classification = classify(&snapshot_with(&[(Channel::Distance, 7.0)]));
        assert_eq!(classification.status(Channel::Distance), Some(Status::Warning));

        let classification = classify(&snapshot_with(&[(Channel::Distance, 2.0)]));
        assert_eq!(classification.status(Channel::Distance), Some(Status::Normal));
    }

    #[test]
    fn test_turbidity_bands() {
        let cases = [
            (1200.0, Status::Danger),
            (800.0, Status::Warning),
            (700.0, Status::Normal),
            (-1370.39, Status::Normal),
        ];
        for (value, expected) in cases {
            let classification = classify(&snapshot_with(&[(Channel::Turbidity, value)]));
            assert_eq!(classification.status(Channel::Turbidity), Some(expected), "{value}");
        }
    }

    #[test]
    fn test_tds_range() {
        let cases = [
            (49.0, Status::Danger),
            (50.0, Status::Normal),
            (300.0, Status::Normal),
            (301.0, Status::Danger),
        ];
        for (value, expected) in cases {
            let classification = classify(&snapshot_with(&[(Channel::Tds, value)]));
            assert_eq!(classification.status(Channel::Tds), Some(expected), "{value}");
        }
    }

    #[test]
    fn test_tank_integrity() {
        let cases = [
            (46.0, 25.0, TankIntegrity::Good),
            (46.0, 31.0, TankIntegrity::Compromised),
            (40.0, 31.0, TankIntegrity::Normal),
            (46.0, 30.0, TankIntegrity::Normal),
        ];
        for (ambient, water, expected) in cases {
            let classification = classify(&snapshot_with(&[
                (Channel::AmbientTemperature, ambient),
                (Channel::WaterTemperature, water),
            ]));
            assert_eq!(classification.tank_integrity, Some(expected));
        }
    }

    #[test]
    fn test_partial_snapshot_is_tolerated() {
        let classification = classify(&Snapshot::empty(ThresholdConfig::default()));
        assert!(classification.channels.is_empty());
        assert_eq!(classification.water_level, None);
        assert_eq!(classification.tank_integrity, None);

        let classification = classify(&snapshot_with(&[(Channel::AmbientTemperature, 50.0)]));
        assert_eq!(classification.tank_integrity, None);
        assert_eq!(classification.status(Channel::AmbientTemperature), None);
    }
}
