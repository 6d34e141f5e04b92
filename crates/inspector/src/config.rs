use crate::collaborators::MqttConfig;
use crate::error::ConfigError;
use capture::CaptureConfig;
use common::Environment;
use controller::LinkConfig;
use inference::InferenceConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "INSPECTOR";

/// Per-inspection behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Frames captured per inspection. 1 disables burst aggregation. Default 1.
    pub burst_frames: usize,
    /// Delay between burst frames. Default 40 ms.
    pub burst_interval_ms: u64,
    /// Run a warm-up inference at startup to check the model against the
    /// class catalog. Default true.
    pub verify_catalog: bool,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            burst_frames: 1,
            burst_interval_ms: 40,
            verify_catalog: true,
        }
    }
}

impl InspectionConfig {
    pub fn burst_interval(&self) -> Duration {
        Duration::from_millis(self.burst_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    #[default]
    All,
    Rejects,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for annotated images. Default `inspections`.
    pub image_root: PathBuf,
    pub save: SavePolicy,
    /// JPEG quality, 1..=100. Default 90.
    pub jpeg_quality: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from("inspections"),
            save: SavePolicy::All,
            jpeg_quality: 90,
        }
    }
}

/// Complete station configuration, built once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub environment: Environment,
    /// Log filter used when `RUST_LOG` is unset. Default `info`.
    pub log_level: Option<String>,
    /// OTLP collector endpoint. Telemetry export is off when unset.
    pub otel_endpoint: Option<String>,
    pub camera: CaptureConfig,
    pub model: InferenceConfig,
    pub link: LinkConfig,
    pub inspection: InspectionConfig,
    pub storage: StorageConfig,
    /// Publish records to MQTT when present.
    pub mqtt: Option<MqttConfig>,
}

impl InspectorConfig {
    /// Defaults, then the optional TOML file, then `INSPECTOR_*` environment
    /// variables (`__` separates nested keys, e.g. `INSPECTOR_LINK__DEVICE`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: InspectorConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("model.confidence_threshold", self.model.confidence_threshold)?;
        check_unit("model.iou_threshold", self.model.iou_threshold)?;

        if !(self.model.min_box_px >= 0.0) {
            return Err(ConfigError::Invalid {
                name: "model.min_box_px",
                reason: "must be non-negative".to_string(),
            });
        }
        if self.model.input_size == 0 {
            return Err(ConfigError::Invalid {
                name: "model.input_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.model.max_candidates == Some(0) {
            return Err(ConfigError::Invalid {
                name: "model.max_candidates",
                reason: "must be positive when set".to_string(),
            });
        }
        if self.inspection.burst_frames == 0 {
            return Err(ConfigError::Invalid {
                name: "inspection.burst_frames",
                reason: "at least one frame is required".to_string(),
            });
        }
        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(ConfigError::Invalid {
                name: "storage.jpeg_quality",
                reason: format!("{} is outside 1..=100", self.storage.jpeg_quality),
            });
        }

        self.link.tokens.validate()?;
        self.model.catalog()?;
        Ok(())
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn defaults_are_valid() {
        let config = InspectorConfig::load(None).unwrap();

        assert_eq!(config.inspection.burst_frames, 1);
        assert_eq!(config.link.tokens.pass, "PASS");
        assert_eq!(config.model.classes.len(), 7);
        assert!(config.mqtt.is_none());
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
environment = "production"

[inspection]
burst_frames = 5

[link]
transport = "tcp"
address = "10.0.0.5:4000"

[link.tokens]
pass = "OK"
reject = "NG"

[model]
confidence_threshold = 0.35
score_activation = "sigmoid"

[mqtt]
host = "broker"
"#
        )
        .unwrap();

        let config = InspectorConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.inspection.burst_frames, 5);
        assert_eq!(config.link.transport, controller::TransportKind::Tcp);
        assert_eq!(config.link.tokens.reject, "NG");
        assert_eq!(config.link.tokens.detection, "DETECTED");
        assert_eq!(config.model.confidence_threshold, 0.35);
        assert_eq!(config.mqtt.unwrap().port, 1883);
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            std::env::set_var("INSPECTOR_LINK__SETTLE_MS", "250");
            std::env::set_var("INSPECTOR_INSPECTION__BURST_FRAMES", "3");
        }

        let config = InspectorConfig::load(None);

        unsafe {
            std::env::remove_var("INSPECTOR_LINK__SETTLE_MS");
            std::env::remove_var("INSPECTOR_INSPECTION__BURST_FRAMES");
        }

        let config = config.unwrap();
        assert_eq!(config.link.settle_ms, 250);
        assert_eq!(config.inspection.burst_frames, 3);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = InspectorConfig::default();
        config.model.iou_threshold = 1.5;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                name: "model.iou_threshold",
                ..
            })
        ));
    }

    #[test]
    fn zero_burst_rejected() {
        let mut config = InspectorConfig::default();
        config.inspection.burst_frames = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn inconsistent_catalog_rejected() {
        let mut config = InspectorConfig::default();
        config.model.classes.retain(|c| c != "fill");
        assert!(matches!(config.validate(), Err(ConfigError::Catalog(_))));
    }

    #[test]
    fn duplicate_tokens_rejected() {
        let mut config = InspectorConfig::default();
        config.link.tokens.ping = "PASS".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Protocol(_))));
    }
}
