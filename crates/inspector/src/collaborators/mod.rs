//! Work done after the verdict has been sent: image persistence and record
//! publication. Failures here are logged and never affect the verdict.

mod image_store;
mod mqtt;

pub use image_store::{DirectoryImageStore, ImageCategory, ImageStore};
pub use mqtt::{MqttConfig, MqttRecordSink};

use crate::decision::{ComponentPresence, Outcome};
use crate::orchestrator::TriggerSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Everything known about one finished inspection.
#[derive(Debug, Clone, Serialize)]
pub struct InspectionRecord {
    pub timestamp: DateTime<Utc>,
    pub trigger: TriggerSource,
    pub outcome: Outcome,
    pub reason: String,
    pub components: ComponentPresence,
    pub defects: Vec<String>,
    pub image_path: Option<PathBuf>,
    pub duration_ms: f64,
    /// Whether the verdict command reached the controller.
    pub command_sent: bool,
    pub frames: usize,
    pub detections: usize,
}

pub trait RecordSink: Send + Sync {
    fn record(&self, record: &InspectionRecord) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// Writes every record to the log.
pub struct TracingRecordSink;

impl RecordSink for TracingRecordSink {
    fn record(&self, record: &InspectionRecord) -> anyhow::Result<()> {
        tracing::info!(
            outcome = %record.outcome,
            reason = %record.reason,
            trigger = ?record.trigger,
            cap = record.components.cap,
            fill = record.components.fill,
            label = record.components.label,
            defects = ?record.defects,
            image = ?record.image_path,
            duration_ms = record.duration_ms,
            command_sent = record.command_sent,
            "Inspection complete"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Optional image store plus any number of record sinks.
#[derive(Default)]
pub struct Collaborators {
    pub image_store: Option<Box<dyn ImageStore>>,
    pub sinks: Vec<Box<dyn RecordSink>>,
}
