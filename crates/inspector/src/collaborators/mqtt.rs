use super::{InspectionRecord, RecordSink};
use anyhow::Context;
use rumqttc::{Client, ConnectionError, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub device_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "inspector/records".to_string(),
            device_id: "station-1".to_string(),
        }
    }
}

#[derive(Serialize)]
struct RecordMessage<'a> {
    device_id: &'a str,
    #[serde(flatten)]
    record: &'a InspectionRecord,
}

/// Publishes every record as JSON to an MQTT topic.
///
/// Publishing is queued; the broker connection is driven by a background
/// thread that reconnects with backoff.
pub struct MqttRecordSink {
    client: Client,
    topic: String,
    device_id: String,
    connected: Arc<AtomicBool>,
}

impl MqttRecordSink {
    pub fn new(config: &MqttConfig) -> anyhow::Result<Self> {
        let client_id = format!("inspector-{}", config.device_id);
        let mut mqtt_options = MqttOptions::new(client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(true);

        let (client, mut connection) = Client::new(mqtt_options, 10);
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = Arc::clone(&connected);

        std::thread::Builder::new()
            .name("mqtt-events".into())
            .spawn(move || {
                let mut reconnect_attempts = 0u32;

                loop {
                    for notification in connection.iter() {
                        match notification {
                            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                                connected_clone.store(true, Ordering::Release);
                                reconnect_attempts = 0;
                                tracing::info!("MQTT connected to broker");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                connected_clone.store(false, Ordering::Release);
                                match &e {
                                    ConnectionError::Io(_) | ConnectionError::NetworkTimeout => {
                                        reconnect_attempts = reconnect_attempts.saturating_add(1);
                                        let backoff = calculate_backoff(reconnect_attempts);
                                        tracing::warn!(
                                            error = %e,
                                            attempt = reconnect_attempts,
                                            backoff_ms = backoff.as_millis(),
                                            "MQTT connection lost, reconnecting"
                                        );
                                        std::thread::sleep(backoff);
                                    }
                                    _ => {
                                        tracing::error!(error = %e, "MQTT error");
                                    }
                                }
                            }
                        }
                    }

                    // Iterator ended on disconnect; iterating again reconnects.
                    connected_clone.store(false, Ordering::Release);
                    reconnect_attempts = reconnect_attempts.saturating_add(1);
                    std::thread::sleep(calculate_backoff(reconnect_attempts));
                }
            })
            .context("Failed to spawn MQTT event thread")?;

        tracing::info!(
            broker = %format!("{}:{}", config.host, config.port),
            topic = %config.topic,
            device_id = %config.device_id,
            "MQTT record sink initialized"
        );

        Ok(Self {
            client,
            topic: config.topic.clone(),
            device_id: config.device_id.clone(),
            connected,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl RecordSink for MqttRecordSink {
    fn record(&self, record: &InspectionRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&RecordMessage {
            device_id: &self.device_id,
            record,
        })
        .context("Failed to serialize inspection record")?;

        if !self.is_connected() {
            tracing::debug!("MQTT broker not connected, record queued");
        }

        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, payload.into_bytes())
            .context("Failed to publish MQTT message")?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Calculate exponential backoff with jitter, capped at 30 seconds
fn calculate_backoff(attempt: u32) -> Duration {
    const BASE_MS: u64 = 100;
    const MAX_MS: u64 = 30_000;

    let exp_backoff = BASE_MS.saturating_mul(2u64.saturating_pow(attempt.min(10)));
    let capped = exp_backoff.min(MAX_MS);

    let jitter = (capped / 10).max(1);
    let jittered = capped.saturating_add(fastrand::u64(0..jitter));

    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{ComponentPresence, Outcome};
    use crate::orchestrator::TriggerSource;

    #[test]
    fn backoff_grows_and_caps() {
        let first = calculate_backoff(1);
        assert!(first >= Duration::from_millis(200) && first < Duration::from_millis(220));

        let capped = calculate_backoff(30);
        assert!(capped >= Duration::from_millis(30_000));
        assert!(capped < Duration::from_millis(33_000));
    }

    #[test]
    fn message_flattens_record() {
        let record = InspectionRecord {
            timestamp: chrono::Utc::now(),
            trigger: TriggerSource::Hardware,
            outcome: Outcome::Ng,
            reason: "missing components: label".to_string(),
            components: ComponentPresence {
                cap: true,
                fill: true,
                label: false,
            },
            defects: Vec::new(),
            image_path: None,
            duration_ms: 12.5,
            command_sent: true,
            frames: 1,
            detections: 2,
        };

        let json: serde_json::Value = serde_json::to_value(RecordMessage {
            device_id: "line-3",
            record: &record,
        })
        .unwrap();

        assert_eq!(json["device_id"], "line-3");
        assert_eq!(json["outcome"], "NG");
        assert_eq!(json["trigger"], "hardware");
        assert_eq!(json["components"]["label"], false);
    }
}
