use crate::application::broadcaster::DEFAULT_OBSERVER_QUEUE;
use crate::domain::thresholds::{ThresholdConfig, ThresholdError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub mqtt: MqttSettings,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub broadcast: BroadcastSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MqttProtocol {
    Mqtt,
    Mqtts,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub protocol: MqttProtocol,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub topic: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
            protocol: MqttProtocol::Mqtts,
            username: None,
            password: None,
            client_id: "tank-telemetry".to_string(),
            topic: "sensor/data".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BroadcastSettings {
    /// Snapshots buffered per observer before the oldest is dropped.
    pub observer_queue: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            observer_queue: DEFAULT_OBSERVER_QUEUE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
    #[error("broadcast.observer_queue must be at least 1")]
    EmptyObserverQueue,
    #[error("mqtt.{0} must not be empty")]
    EmptyMqttSetting(&'static str),
}

/// Variables honoured for compatibility with existing deployments.
const LEGACY_MQTT_VARS: [(&str, &str); 5] = [
    ("MQTT_HOST", "mqtt.host"),
    ("MQTT_PORT", "mqtt.port"),
    ("MQTT_PROTOCOL", "mqtt.protocol"),
    ("MQTT_USERNAME", "mqtt.username"),
    ("MQTT_PASSWORD", "mqtt.password"),
];

pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("config/telemetry").required(false))
        .add_source(
            config::Environment::with_prefix("TANK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    for (var, key) in LEGACY_MQTT_VARS {
        builder = builder.set_override_option(key, std::env::var(var).ok())?;
    }

    let settings: AppConfig = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.broadcast.observer_queue == 0 {
            return Err(ConfigError::EmptyObserverQueue);
        }
        if self.mqtt.client_id.trim().is_empty() {
            return Err(ConfigError::EmptyMqttSetting("client_id"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::EmptyMqttSetting("topic"));
        }
        Ok(())
    }
}
