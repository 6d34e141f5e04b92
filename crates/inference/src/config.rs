use crate::catalog::{ClassCatalog, DEFAULT_CLASSES, DEFAULT_DEFECT_CLASSES};
use crate::decoder::{DecoderSettings, ScoreActivation};
use crate::error::CatalogError;
use preprocess::TensorLayout;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

/// Model and decoding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Model file, directory, or file prefix. `None` runs without a model.
    pub model_path: Option<PathBuf>,
    /// Side of the square input for the mobile runtime. Default 320.
    pub input_size: u32,
    /// Tensor layout for the mobile runtime. Default NCHW.
    pub layout: TensorLayout,
    /// Tensor layout for dense graphs fed raw bytes. Default NHWC.
    pub native_layout: TensorLayout,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
    /// Minimum class score kept by the decoder. Default 0.5.
    pub confidence_threshold: f32,
    /// IoU above which the weaker of two boxes is suppressed. Default 0.45.
    pub iou_threshold: f32,
    /// Minimum clamped box side in pixels. Default 2.0.
    pub min_box_px: f32,
    /// Scan at most this many candidate rows per frame. Rows beyond the cap
    /// are never considered, so results may be incomplete. Default: no cap.
    pub max_candidates: Option<usize>,
    pub score_activation: ScoreActivation,
    pub classes: Vec<String>,
    /// Leading entries of `classes` that are defect classes. Default 4.
    pub defect_classes: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 320,
            layout: TensorLayout::Nchw,
            native_layout: TensorLayout::Nhwc,
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 4,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            min_box_px: 2.0,
            max_candidates: None,
            score_activation: ScoreActivation::Auto,
            classes: DEFAULT_CLASSES.iter().map(|s| s.to_string()).collect(),
            defect_classes: DEFAULT_DEFECT_CLASSES,
        }
    }
}

impl InferenceConfig {
    pub fn catalog(&self) -> Result<ClassCatalog, CatalogError> {
        ClassCatalog::new(self.classes.clone(), self.defect_classes)
    }

    pub fn decoder_settings(&self) -> DecoderSettings {
        DecoderSettings {
            confidence_threshold: self.confidence_threshold,
            min_box_px: self.min_box_px,
            max_candidates: self.max_candidates,
            activation: self.score_activation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = InferenceConfig::default().catalog().unwrap();
        assert_eq!(catalog.len(), 7);
    }
}
