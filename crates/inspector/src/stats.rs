use crate::decision::Outcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals since startup.
#[derive(Debug, Default)]
pub struct InspectionStats {
    ok: AtomicU64,
    ng: AtomicU64,
    dropped_triggers: AtomicU64,
    send_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub ok: u64,
    pub ng: u64,
    pub dropped_triggers: u64,
    pub send_failures: u64,
}

impl StatsSnapshot {
    pub fn inspections(&self) -> u64 {
        self.ok + self.ng
    }
}

impl InspectionStats {
    pub fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Ok => self.ok.fetch_add(1, Ordering::Relaxed),
            Outcome::Ng => self.ng.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_dropped(&self) {
        self.dropped_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ok: self.ok.load(Ordering::Relaxed),
            ng: self.ng.load(Ordering::Relaxed),
            dropped_triggers: self.dropped_triggers.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_kind() {
        let stats = InspectionStats::default();
        stats.record_outcome(Outcome::Ok);
        stats.record_outcome(Outcome::Ng);
        stats.record_outcome(Outcome::Ng);
        stats.record_dropped();
        stats.record_send_failure();

        let snap = stats.snapshot();
        assert_eq!(
            snap,
            StatsSnapshot {
                ok: 1,
                ng: 2,
                dropped_triggers: 1,
                send_failures: 1
            }
        );
        assert_eq!(snap.inspections(), 3);
    }
}
