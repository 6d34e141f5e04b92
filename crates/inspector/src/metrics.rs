use crate::decision::Outcome;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// OpenTelemetry instruments for the inspection loop. No-ops unless a meter
/// provider has been installed.
pub struct InspectionMetrics {
    duration: Histogram<f64>,
    inspections: Counter<u64>,
    dropped: Counter<u64>,
    send_failures: Counter<u64>,
}

impl InspectionMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0,
        ];

        Self {
            duration: meter
                .f64_histogram("inspection_duration_seconds")
                .with_description("Time from trigger to completed inspection")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            inspections: meter
                .u64_counter("inspections_total")
                .with_description("Completed inspections by outcome")
                .build(),
            dropped: meter
                .u64_counter("inspection_triggers_dropped_total")
                .with_description("Triggers ignored because an inspection was in flight")
                .build(),
            send_failures: meter
                .u64_counter("inspection_command_failures_total")
                .with_description("Verdict commands that could not be written to the controller")
                .build(),
        }
    }

    pub fn record_inspection(&self, outcome: Outcome, seconds: f64) {
        let attrs = [KeyValue::new("outcome", outcome.as_str())];
        self.duration.record(seconds, &attrs);
        self.inspections.add(1, &attrs);
    }

    pub fn record_dropped(&self) {
        self.dropped.add(1, &[]);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.add(1, &[]);
    }
}
