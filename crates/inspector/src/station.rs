use crate::collaborators::{
    Collaborators, DirectoryImageStore, ImageStore, InspectionRecord, MqttRecordSink, RecordSink,
    TracingRecordSink,
};
use crate::config::{InspectorConfig, SavePolicy};
use crate::orchestrator::Orchestrator;
use crate::stats::StatsSnapshot;
use anyhow::Context;
use capture::{CameraSource, CaptureConfig, FrameSource, SourceKind, SyntheticSource};
use controller::{HardwareLink, ProtocolCommand};
use inference::{Detector, LoadStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// The assembled inspection station: started frame source, loaded detector,
/// connected link and the orchestrator tying them together.
pub struct Station {
    orchestrator: Orchestrator,
    link: Arc<dyn HardwareLink>,
    start_conveyor: bool,
}

impl Station {
    pub fn assemble(config: &InspectorConfig) -> anyhow::Result<Self> {
        let source = open_source(&config.camera)?;

        let mut detector =
            Detector::from_config(&config.model).context("Invalid class catalog")?;
        match detector.status() {
            LoadStatus::Loaded { backend } => tracing::info!(%backend, "Model loaded"),
            LoadStatus::Unloaded { reason } => {
                tracing::warn!(%reason, "Running without a model, every bottle will be rejected")
            }
        }

        if config.inspection.verify_catalog {
            let (width, height) = source
                .read()
                .map(|f| (f.width(), f.height()))
                .unwrap_or((config.camera.synthetic.width, config.camera.synthetic.height));
            detector
                .verify_catalog(width, height)
                .context("Model output does not match the class catalog")?;
        }

        let link = controller::establish(&config.link).context("Failed to connect controller")?;
        tracing::info!(link = %link.describe(), "Controller link ready");

        let collaborators = build_collaborators(config, &detector);

        let orchestrator = Orchestrator::new(
            Arc::from(source),
            detector,
            Arc::clone(&link),
            collaborators,
            config.inspection.clone(),
            config.storage.save,
        )?;

        Ok(Self {
            orchestrator,
            link,
            start_conveyor: config.link.start_conveyor_on_run,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn link(&self) -> &Arc<dyn HardwareLink> {
        &self.link
    }

    /// One manual inspection on the calling thread.
    pub fn inspect_once(&self) -> Option<InspectionRecord> {
        self.orchestrator.inspect_now()
    }

    /// Inspect on every detection signal until `shutdown` is set.
    pub fn run(&self, shutdown: &AtomicBool) -> anyhow::Result<StatsSnapshot> {
        self.link
            .start_listening(self.orchestrator.detection_callback())
            .context("Failed to start listening for detection signals")?;

        if self.start_conveyor {
            if let Err(e) = self.link.send(ProtocolCommand::StartConveyor) {
                tracing::error!(error = %e, "Failed to start conveyor");
            }
        }

        tracing::info!("Inspector running");
        while !shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(SHUTDOWN_POLL);
        }
        tracing::info!("Shutdown requested");

        if self.start_conveyor {
            if let Err(e) = self.link.send(ProtocolCommand::StopConveyor) {
                tracing::warn!(error = %e, "Failed to stop conveyor");
            }
        }
        self.link.stop_listening();
        self.orchestrator.shutdown();

        Ok(self.orchestrator.stats())
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.orchestrator.shutdown();
        self.link.disconnect();
    }
}

/// Start the configured source, substituting the synthetic one if the camera
/// fails and fallback is enabled.
fn open_source(config: &CaptureConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    let mut source: Box<dyn FrameSource> = match config.source {
        SourceKind::Camera => Box::new(CameraSource::new(config)),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(config)),
    };

    match source.start() {
        Ok(()) => {}
        Err(e) if config.source == SourceKind::Camera && config.fallback_to_synthetic => {
            tracing::warn!(error = %e, "Camera unavailable, using synthetic frames");
            source = Box::new(SyntheticSource::new(config));
            source.start().context("Failed to start synthetic source")?;
        }
        Err(e) => return Err(e).context("Failed to start frame source"),
    }

    tracing::info!(source = %source.describe(), "Frame source started");
    Ok(source)
}

fn build_collaborators(config: &InspectorConfig, detector: &Detector) -> Collaborators {
    let mut sinks: Vec<Box<dyn RecordSink>> = vec![Box::new(TracingRecordSink)];

    if let Some(mqtt) = &config.mqtt {
        match MqttRecordSink::new(mqtt) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(e) => tracing::warn!(error = %e, "MQTT publishing disabled"),
        }
    }

    let image_store: Option<Box<dyn ImageStore>> = match config.storage.save {
        SavePolicy::None => None,
        SavePolicy::All | SavePolicy::Rejects => Some(Box::new(DirectoryImageStore::new(
            config.storage.image_root.clone(),
            config.storage.jpeg_quality,
            detector.catalog().clone(),
        ))),
    };

    Collaborators { image_store, sinks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use controller::{LinkState, TransportKind};

    fn offline_config(root: &std::path::Path) -> InspectorConfig {
        let mut config = InspectorConfig::default();
        config.camera.source = SourceKind::Synthetic;
        config.camera.synthetic.width = 64;
        config.camera.synthetic.height = 48;
        config.link.transport = TransportKind::Simulated;
        config.storage.image_root = root.to_path_buf();
        config
    }

    #[test]
    fn assembles_without_hardware_or_model() {
        let dir = tempfile::tempdir().unwrap();
        let station = Station::assemble(&offline_config(dir.path())).unwrap();

        assert_eq!(station.link().state(), LinkState::Connected);
        assert!(!station.orchestrator().is_busy());
    }

    #[test]
    fn manual_inspection_without_model_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let station = Station::assemble(&offline_config(dir.path())).unwrap();

        let record = station.inspect_once().unwrap();

        assert_eq!(record.outcome, crate::Outcome::Ng);
        assert!(record.command_sent);
        assert!(record.image_path.is_some_and(|p| p.starts_with(dir.path().join("reject"))));
    }

    #[test]
    fn run_returns_once_shutdown_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let station = Station::assemble(&offline_config(dir.path())).unwrap();

        let stats = station.run(&AtomicBool::new(true)).unwrap();

        assert_eq!(stats.inspections(), 0);
        assert_eq!(station.link().state(), LinkState::Connected);
    }
}
