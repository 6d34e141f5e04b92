use crate::aggregator::Evidence;
use controller::ProtocolCommand;
use inference::Component;
use serde::Serialize;
use std::fmt;

pub const OK_REASON: &str = "no defects, all components present";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "OK",
            Outcome::Ng => "NG",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ComponentPresence {
    pub cap: bool,
    pub fill: bool,
    pub label: bool,
}

impl ComponentPresence {
    pub fn get(&self, component: Component) -> bool {
        match component {
            Component::Cap => self.cap,
            Component::Fill => self.fill,
            Component::Label => self.label,
        }
    }
}

/// Result of one inspection. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub reason: String,
    pub defects: Vec<String>,
    pub components: ComponentPresence,
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// Command that tells the controller what to do with this bottle.
    pub fn command(&self) -> ProtocolCommand {
        match self.outcome {
            Outcome::Ok => ProtocolCommand::Pass,
            Outcome::Ng => ProtocolCommand::Reject,
        }
    }
}

/// Apply the inspection rules in order:
///
/// 1. any defect rejects, and the reason names only the defects;
/// 2. otherwise any missing component rejects, naming every missing one;
/// 3. otherwise the bottle passes.
pub fn decide(evidence: &Evidence) -> Verdict {
    let components = ComponentPresence {
        cap: evidence.has_component(Component::Cap),
        fill: evidence.has_component(Component::Fill),
        label: evidence.has_component(Component::Label),
    };

    if !evidence.defects.is_empty() {
        return Verdict {
            outcome: Outcome::Ng,
            reason: format!("defects detected: {}", evidence.defects.join(", ")),
            defects: evidence.defects.clone(),
            components,
        };
    }

    let missing: Vec<&str> = Component::ALL
        .into_iter()
        .filter(|c| !components.get(*c))
        .map(|c| c.as_str())
        .collect();

    if !missing.is_empty() {
        return Verdict {
            outcome: Outcome::Ng,
            reason: format!("missing components: {}", missing.join(", ")),
            defects: Vec::new(),
            components,
        };
    }

    Verdict {
        outcome: Outcome::Ok,
        reason: OK_REASON.to_string(),
        defects: Vec::new(),
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FrameEvidence;
    use capture::Frame;
    use inference::{BoundingBox, ClassCatalog, RawDetection};

    fn evidence(names: &[&str]) -> Evidence {
        let catalog = ClassCatalog::default();
        let detections = names
            .iter()
            .map(|n| RawDetection {
                class_id: catalog.class_id(n).unwrap(),
                confidence: 0.9,
                bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            })
            .collect();
        Evidence::aggregate(
            vec![FrameEvidence {
                frame: Frame::blank(16, 16, 0),
                detections,
            }],
            &catalog,
        )
    }

    #[test]
    fn all_components_no_defects_passes() {
        let verdict = decide(&evidence(&["cap", "fill", "label"]));

        assert_eq!(verdict.outcome, Outcome::Ok);
        assert_eq!(verdict.reason, "no defects, all components present");
        assert!(verdict.defects.is_empty());
        assert_eq!(
            verdict.components,
            ComponentPresence {
                cap: true,
                fill: true,
                label: true
            }
        );
        assert_eq!(verdict.command(), ProtocolCommand::Pass);
    }

    #[test]
    fn single_defect_rejects_naming_only_that_defect() {
        let verdict = decide(&evidence(&["Label-Defect"]));

        assert_eq!(verdict.outcome, Outcome::Ng);
        assert_eq!(verdict.reason, "defects detected: Label-Defect");
        assert_eq!(verdict.defects, vec!["Label-Defect"]);
        assert!(!verdict.reason.contains("missing"));
        assert_eq!(verdict.command(), ProtocolCommand::Reject);
    }

    #[test]
    fn missing_label_rejects_naming_only_label() {
        let verdict = decide(&evidence(&["cap", "fill"]));

        assert_eq!(verdict.outcome, Outcome::Ng);
        assert_eq!(verdict.reason, "missing components: label");
        assert!(!verdict.components.label);
    }

    #[test]
    fn nothing_detected_reports_all_three_missing() {
        let verdict = decide(&evidence(&[]));

        assert_eq!(verdict.outcome, Outcome::Ng);
        assert_eq!(verdict.reason, "missing components: cap, fill, label");
    }

    #[test]
    fn defect_dominates_missing_component() {
        let verdict = decide(&evidence(&["cap", "Fill-Defect", "Cap-Defect"]));

        assert_eq!(verdict.outcome, Outcome::Ng);
        assert_eq!(verdict.reason, "defects detected: Cap-Defect, Fill-Defect");
        assert!(!verdict.reason.contains("missing"));
        assert!(verdict.components.cap);
        assert!(!verdict.components.label);
    }

    #[test]
    fn outcome_serializes_as_short_code() {
        assert_eq!(serde_json::to_string(&Outcome::Ng).unwrap(), "\"NG\"");
    }
}
