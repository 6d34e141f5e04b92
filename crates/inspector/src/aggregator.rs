use capture::Frame;
use inference::{ClassCatalog, Component, RawDetection};
use std::collections::BTreeSet;

/// Detections found on one captured frame.
#[derive(Debug, Clone)]
pub struct FrameEvidence {
    pub frame: Frame,
    pub detections: Vec<RawDetection>,
}

/// Presence evidence merged over every frame of an inspection.
#[derive(Debug, Clone, Default)]
pub struct Evidence {
    /// Distinct defect class names, in catalog order.
    pub defects: Vec<String>,
    pub components: BTreeSet<Component>,
    pub frames: Vec<FrameEvidence>,
    representative: Option<usize>,
}

impl Evidence {
    /// Union the per-frame detections: anything seen on any frame counts as seen.
    ///
    /// The representative frame is the one with the most detections, the
    /// earliest on ties.
    pub fn aggregate(frames: Vec<FrameEvidence>, catalog: &ClassCatalog) -> Self {
        let mut defect_ids = BTreeSet::new();
        let mut components = BTreeSet::new();

        for detection in frames.iter().flat_map(|f| &f.detections) {
            if catalog.is_defect(detection.class_id) {
                defect_ids.insert(detection.class_id);
            } else if let Some(component) = catalog.component(detection.class_id) {
                components.insert(component);
            }
        }

        let defects = defect_ids
            .into_iter()
            .filter_map(|id| catalog.name(id).map(str::to_string))
            .collect();

        let representative = frames
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, usize)>, (i, f)| match best {
                Some((_, count)) if f.detections.len() <= count => best,
                _ => Some((i, f.detections.len())),
            })
            .map(|(i, _)| i);

        Self {
            defects,
            components,
            frames,
            representative,
        }
    }

    pub fn has_component(&self, component: Component) -> bool {
        self.components.contains(&component)
    }

    /// Frame chosen for the annotated image.
    pub fn representative(&self) -> Option<&FrameEvidence> {
        self.representative.and_then(|i| self.frames.get(i))
    }

    pub fn total_detections(&self) -> usize {
        self.frames.iter().map(|f| f.detections.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference::BoundingBox;

    fn det(class_id: usize) -> RawDetection {
        RawDetection {
            class_id,
            confidence: 0.9,
            bbox: BoundingBox::new(1.0, 1.0, 10.0, 10.0),
        }
    }

    fn frame_with(index: u64, classes: &[usize]) -> FrameEvidence {
        let frame = Frame::new(vec![0; 8 * 8 * 3], 8, 8, capture::ColorOrder::Bgr, index).unwrap();
        FrameEvidence {
            frame,
            detections: classes.iter().map(|&c| det(c)).collect(),
        }
    }

    #[test]
    fn component_seen_in_one_frame_counts_as_present() {
        let catalog = ClassCatalog::default();
        let evidence = Evidence::aggregate(
            vec![
                frame_with(0, &[4, 5]),
                frame_with(1, &[4, 5, 6]),
                frame_with(2, &[4, 5]),
                frame_with(3, &[]),
                frame_with(4, &[5]),
            ],
            &catalog,
        );

        assert!(evidence.has_component(Component::Label));
        assert!(evidence.has_component(Component::Cap));
        assert!(evidence.has_component(Component::Fill));
        assert!(evidence.defects.is_empty());
    }

    #[test]
    fn defects_are_distinct_and_in_catalog_order() {
        let catalog = ClassCatalog::default();
        let evidence = Evidence::aggregate(
            vec![frame_with(0, &[2, 0]), frame_with(1, &[2, 4])],
            &catalog,
        );

        assert_eq!(evidence.defects, vec!["Cap-Defect", "Label-Defect"]);
        assert_eq!(evidence.total_detections(), 4);
    }

    #[test]
    fn representative_is_busiest_frame_first_on_ties() {
        let catalog = ClassCatalog::default();
        let evidence = Evidence::aggregate(
            vec![
                frame_with(0, &[4]),
                frame_with(1, &[4, 5]),
                frame_with(2, &[5, 6]),
            ],
            &catalog,
        );

        assert_eq!(evidence.representative().unwrap().frame.index(), 1);
    }

    #[test]
    fn empty_burst_has_no_representative() {
        let evidence = Evidence::aggregate(Vec::new(), &ClassCatalog::default());
        assert!(evidence.representative().is_none());
        assert!(evidence.components.is_empty());
    }
}
