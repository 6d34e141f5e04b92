pub mod aggregator;
pub mod collaborators;
pub mod config;
pub mod decision;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod station;
pub mod stats;

pub use aggregator::{Evidence, FrameEvidence};
pub use config::InspectorConfig;
pub use decision::{ComponentPresence, Outcome, Verdict, decide};
pub use error::ConfigError;
pub use orchestrator::{Orchestrator, TriggerSource};
pub use station::Station;
pub use stats::StatsSnapshot;
