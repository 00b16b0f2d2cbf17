// MQTT ingestion - Subscribes to the sensor topic and feeds the service
use crate::application::telemetry_service::TelemetryService;
use crate::application::telemetry_source::{IngestionLink, LinkStatus, TelemetrySource};
use crate::infrastructure::config::{MqttProtocol, MqttSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use std::sync::Arc;
use std::time::Duration;

const REQUEST_CHANNEL_CAPACITY: usize = 10;

pub struct MqttIngestion {
    settings: MqttSettings,
    link: Arc<LinkStatus>,
}

impl MqttIngestion {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            link: Arc::new(LinkStatus::new()),
        }
    }

    fn options(&self) -> MqttOptions {
        let settings = &self.settings;
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));
        options.set_clean_session(true);

        if let Some(username) = &settings.username {
            let password = settings.password.clone().unwrap_or_default();
            options.set_credentials(username, password);
        }
        if settings.protocol == MqttProtocol::Mqtts {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

#[async_trait]
impl TelemetrySource for MqttIngestion {
    async fn run(&self, service: TelemetryService) -> anyhow::Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CHANNEL_CAPACITY);
        let reconnect_delay = Duration::from_millis(self.settings.reconnect_delay_ms);
        let topic = self.settings.topic.clone();

        tracing::info!(
            host = %self.settings.host,
            port = self.settings.port,
            topic = %topic,
            "Connecting to MQTT broker"
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.link.set_connected(true);
                    tracing::info!("Connected to MQTT broker");
                    // Clean sessions drop subscriptions, so subscribe on every connect.
                    if let Err(e) = client.subscribe(topic.clone(), QoS::AtMostOnce).await {
                        tracing::error!("MQTT subscribe error: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    tracing::info!(topic = %topic, "Subscribed to topic");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatch_message(&service, &topic, &publish.topic, &publish.payload, Utc::now());
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.link.set_connected(false);
                    tracing::warn!("MQTT broker closed the connection");
                }
                Ok(_) => {}
                Err(e) => {
                    self.link.set_connected(false);
                    tracing::warn!("MQTT connection error: {}, retrying in {:?}", e, reconnect_delay);
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    }

    fn link(&self) -> Arc<dyn IngestionLink> {
        self.link.clone()
    }
}

/// Routes one broker message into the service. Messages on other topics and
/// undecodable payloads are logged and dropped.
fn dispatch_message(
    service: &TelemetryService,
    subscribed_topic: &str,
    topic: &str,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Option<usize> {
    if topic != subscribed_topic {
        tracing::debug!(topic, "Ignoring message on unexpected topic");
        return None;
    }
    match service.ingest(payload, received_at) {
        Ok(applied) => Some(applied),
        Err(e) => {
            tracing::warn!("Error parsing MQTT message: {}", e);
            None
        }
    }
}
