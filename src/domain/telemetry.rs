// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The fixed set of sensor channels published by the tank controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Channel {
    #[serde(rename = "temperature_ds18b20")]
    WaterTemperature,
    #[serde(rename = "distance_ultrasonic")]
    Distance,
    #[serde(rename = "turbidity")]
    Turbidity,
    #[serde(rename = "tds")]
    Tds,
    #[serde(rename = "humidity_dht11")]
    Humidity,
    #[serde(rename = "temperature_dht11")]
    AmbientTemperature,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::WaterTemperature,
        Channel::Distance,
        Channel::Turbidity,
        Channel::Tds,
        Channel::Humidity,
        Channel::AmbientTemperature,
    ];

    /// Key used for this channel in inbound payloads and outbound snapshots.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Channel::WaterTemperature => "temperature_ds18b20",
            Channel::Distance => "distance_ultrasonic",
            Channel::Turbidity => "turbidity",
            Channel::Tds => "tds",
            Channel::Humidity => "humidity_dht11",
            Channel::AmbientTemperature => "temperature_dht11",
        }
    }

    /// Unknown keys are not an error, they simply map to no channel.
    pub fn from_wire_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.wire_name() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// A single inbound sensor value, before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub channel: Channel,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl SensorEvent {
    pub fn new(channel: Channel, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            channel,
            value,
            timestamp,
        }
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.value, self.timestamp)
    }
}
