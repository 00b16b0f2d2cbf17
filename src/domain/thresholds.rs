// Safety thresholds for the tank
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold record shared by every snapshot. Read from configuration once
/// at start-up and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct ThresholdConfig {
    /// Litres held by a full tank.
    pub tank_total_volume: f64,
    /// Sensor-to-surface distance (cm) of a full tank.
    pub distance_full: f64,
    /// Sensor-to-surface distance (cm) of an empty tank.
    pub distance_empty: f64,
    /// NTU.
    pub turbidity_threshold: f64,
    pub tds_min: f64,
    pub tds_max: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Ambient temperature above which the tank body is considered at risk.
    pub outside_temp_max: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            tank_total_volume: 1000.0,
            distance_full: 1.0,
            distance_empty: 11.0,
            turbidity_threshold: 1000.0,
            tds_min: 50.0,
            tds_max: 300.0,
            temp_min: 15.0,
            temp_max: 30.0,
            outside_temp_max: 45.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("tank_total_volume must be positive, got {0}")]
    NonPositiveVolume(f64),
    #[error("tds_min ({min}) is greater than tds_max ({max})")]
    TdsRange { min: f64, max: f64 },
    #[error("temp_min ({min}) is greater than temp_max ({max})")]
    TemperatureRange { min: f64, max: f64 },
    #[error("threshold {0} is not a finite number")]
    NotFinite(&'static str),
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let fields = [
            ("tank_total_volume", self.tank_total_volume),
            ("distance_full", self.distance_full),
            ("distance_empty", self.distance_empty),
            ("turbidity_threshold", self.turbidity_threshold),
            ("tds_min", self.tds_min),
            ("tds_max", self.tds_max),
            ("temp_min", self.temp_min),
            ("temp_max", self.temp_max),
            ("outside_temp_max", self.outside_temp_max),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ThresholdError::NotFinite(name));
        }
        if self.tank_total_volume <= 0.0 {
            return Err(ThresholdError::NonPositiveVolume(self.tank_total_volume));
        }
        if self.tds_min > self.tds_max {
            return Err(ThresholdError::TdsRange {
                min: self.tds_min,
                max: self.tds_max,
            });
        }
        if self.temp_min > self.temp_max {
            return Err(ThresholdError::TemperatureRange {
                min: self.temp_min,
                max: self.temp_max,
            });
        }
        Ok(())
    }
}
