use crate::aggregator::{Evidence, FrameEvidence};
use crate::collaborators::{Collaborators, ImageCategory, InspectionRecord};
use crate::config::{InspectionConfig, SavePolicy};
use crate::decision::{Verdict, decide};
use crate::metrics::InspectionMetrics;
use crate::stats::{InspectionStats, StatsSnapshot};
use capture::{Frame, FrameSource};
use chrono::Utc;
use common::{join_with_timeout, span};
use controller::{DetectionCallback, HardwareLink};
use inference::{ClassCatalog, Detector};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Manual,
    Hardware,
}

/// Clears the in-flight flag when the inspection ends, however it ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Shared {
    source: Arc<dyn FrameSource>,
    detector: Mutex<Detector>,
    catalog: ClassCatalog,
    link: Arc<dyn HardwareLink>,
    collaborators: Collaborators,
    settings: InspectionConfig,
    save_policy: SavePolicy,
    in_flight: AtomicBool,
    stats: InspectionStats,
    metrics: InspectionMetrics,
}

/// Runs inspections one at a time: capture, detect, decide, send the command,
/// then hand the result to the collaborators.
///
/// Triggers that arrive while an inspection is running are dropped, not
/// queued. An uninspected bottle is left to the reject mechanism's resting
/// state.
pub struct Orchestrator {
    shared: Arc<Shared>,
    trigger_tx: Mutex<Option<SyncSender<TriggerSource>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn FrameSource>,
        detector: Detector,
        link: Arc<dyn HardwareLink>,
        collaborators: Collaborators,
        settings: InspectionConfig,
        save_policy: SavePolicy,
    ) -> anyhow::Result<Self> {
        let shared = Arc::new(Shared {
            source,
            catalog: detector.catalog().clone(),
            detector: Mutex::new(detector),
            link,
            collaborators,
            settings,
            save_policy,
            in_flight: AtomicBool::new(false),
            stats: InspectionStats::default(),
            metrics: InspectionMetrics::new("inspector"),
        });

        let (tx, rx) = mpsc::sync_channel(1);
        let worker = thread::Builder::new()
            .name("inspection-worker".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(shared, rx)
            })?;

        Ok(Self {
            shared,
            trigger_tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue an inspection on the worker thread. Returns false if one is
    /// already in flight or the worker has stopped. Never blocks.
    pub fn trigger(&self, source: TriggerSource) -> bool {
        match lock(&self.trigger_tx).as_ref() {
            Some(tx) => dispatch(&self.shared, tx, source),
            None => false,
        }
    }

    /// Callback for [`HardwareLink::start_listening`]. Only hands the trigger
    /// to the worker so the listener can keep reading.
    pub fn detection_callback(&self) -> DetectionCallback {
        let shared = Arc::clone(&self.shared);
        let tx = lock(&self.trigger_tx).clone();
        Box::new(move || match &tx {
            Some(tx) => {
                dispatch(&shared, tx, TriggerSource::Hardware);
            }
            None => tracing::warn!("Inspection worker stopped, ignoring detection signal"),
        })
    }

    /// Run one inspection on the calling thread. `None` if one is already running.
    pub fn inspect_now(&self) -> Option<InspectionRecord> {
        if !try_begin(&self.shared) {
            return None;
        }
        let _guard = FlightGuard(&self.shared.in_flight);
        Some(run_cycle(&self.shared, TriggerSource::Manual))
    }

    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Stop accepting triggers and join the worker. A running inspection is
    /// allowed to finish within the join timeout.
    pub fn shutdown(&self) {
        lock(&self.trigger_tx).take();
        if let Some(handle) = lock(&self.worker).take() {
            join_with_timeout(handle, WORKER_STOP_TIMEOUT, "inspection-worker");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

fn try_begin(shared: &Shared) -> bool {
    let acquired = shared
        .in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok();

    if !acquired {
        shared.stats.record_dropped();
        shared.metrics.record_dropped();
        tracing::warn!("Inspection in flight, trigger dropped");
    }
    acquired
}

fn dispatch(shared: &Shared, tx: &SyncSender<TriggerSource>, source: TriggerSource) -> bool {
    if !try_begin(shared) {
        return false;
    }

    match tx.try_send(source) {
        Ok(()) => true,
        Err(e) => {
            shared.in_flight.store(false, Ordering::Release);
            match e {
                TrySendError::Full(_) => tracing::warn!("Inspection queue full, trigger dropped"),
                TrySendError::Disconnected(_) => {
                    tracing::warn!("Inspection worker stopped, trigger dropped")
                }
            }
            false
        }
    }
}

fn worker_loop(shared: Arc<Shared>, rx: Receiver<TriggerSource>) {
    tracing::debug!("Inspection worker started");
    for source in rx {
        let _guard = FlightGuard(&shared.in_flight);
        run_cycle(&shared, source);
    }
    tracing::debug!("Inspection worker stopped");
}

fn capture_frames(source: &dyn FrameSource, settings: &InspectionConfig) -> Vec<Frame> {
    let count = settings.burst_frames.max(1);
    let mut frames = Vec::with_capacity(count);

    for i in 0..count {
        if i > 0 {
            thread::sleep(settings.burst_interval());
        }
        match source.read() {
            Some(frame) => frames.push(frame),
            None => tracing::warn!(frame = i, "No frame available"),
        }
    }

    frames
}

fn run_cycle(shared: &Shared, trigger: TriggerSource) -> InspectionRecord {
    let _s = span!("inspection");
    let started = Instant::now();

    let frames = capture_frames(shared.source.as_ref(), &shared.settings);
    if frames.is_empty() {
        tracing::error!("No frames captured, deciding on empty evidence");
    }

    let per_frame: Vec<FrameEvidence> = {
        let mut detector = lock(&shared.detector);
        frames
            .into_iter()
            .map(|frame| {
                let detections = detector.detect(&frame).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, frame = frame.index(), "Detection failed, treating frame as empty");
                    Vec::new()
                });
                FrameEvidence { frame, detections }
            })
            .collect()
    };

    let evidence = Evidence::aggregate(per_frame, &shared.catalog);
    let verdict = decide(&evidence);

    // Nothing may run between the decision and the command.
    let command_sent = match shared.link.send(verdict.command()) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, command = %verdict.command(), "Failed to send verdict");
            shared.stats.record_send_failure();
            shared.metrics.record_send_failure();
            false
        }
    };
    let decided_in = started.elapsed();

    let image_path = save_image(shared, &evidence, &verdict);

    let record = InspectionRecord {
        timestamp: Utc::now(),
        trigger,
        outcome: verdict.outcome,
        reason: verdict.reason.clone(),
        components: verdict.components,
        defects: verdict.defects.clone(),
        image_path,
        duration_ms: decided_in.as_secs_f64() * 1000.0,
        command_sent,
        frames: evidence.frames.len(),
        detections: evidence.total_detections(),
    };

    for sink in &shared.collaborators.sinks {
        if let Err(e) = sink.record(&record) {
            tracing::warn!(sink = sink.name(), error = %e, "Failed to record inspection");
        }
    }

    shared.stats.record_outcome(verdict.outcome);
    shared
        .metrics
        .record_inspection(verdict.outcome, decided_in.as_secs_f64());

    record
}

fn save_image(shared: &Shared, evidence: &Evidence, verdict: &Verdict) -> Option<PathBuf> {
    let store = shared.collaborators.image_store.as_ref()?;
    let wanted = match shared.save_policy {
        SavePolicy::All => true,
        SavePolicy::Rejects => !verdict.is_ok(),
        SavePolicy::None => false,
    };
    if !wanted {
        return None;
    }

    let representative = evidence.representative()?;
    let category = if verdict.is_ok() {
        ImageCategory::Pass
    } else {
        ImageCategory::Reject
    };

    match store.save(&representative.frame, &representative.detections, category) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to save inspection image");
            None
        }
    }
}
