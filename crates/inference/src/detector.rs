use crate::backend::{LoadStatus, ModelRuntime};
use crate::catalog::ClassCatalog;
use crate::config::InferenceConfig;
use crate::decoder::{self, OutputDecoder};
use crate::detection::RawDetection;
use crate::error::CatalogError;
use crate::nms::SuppressionFilter;
use capture::Frame;

/// Model runtime, decoder and suppression bundled for one frame at a time.
pub struct Detector {
    runtime: ModelRuntime,
    decoder: OutputDecoder,
    filter: SuppressionFilter,
    catalog: ClassCatalog,
}

impl Detector {
    pub fn new(runtime: ModelRuntime, catalog: ClassCatalog, config: &InferenceConfig) -> Self {
        Self {
            runtime,
            decoder: OutputDecoder::new(catalog.len(), config.decoder_settings()),
            filter: SuppressionFilter::new(config.iou_threshold),
            catalog,
        }
    }

    /// Build the catalog and load the model described by `config`.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, CatalogError> {
        let catalog = config.catalog()?;
        Ok(Self::new(ModelRuntime::load(config), catalog, config))
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn status(&self) -> &LoadStatus {
        self.runtime.status()
    }

    /// Run the model on one frame and return suppressed detections in frame
    /// pixel coordinates.
    pub fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<RawDetection>> {
        let output = self.runtime.infer(frame)?;
        let original = (frame.width(), frame.height());

        let mut candidates = Vec::new();
        for tensor in &output.tensors {
            candidates.extend(self.decoder.decode(tensor, output.input_size, original)?);
        }

        Ok(self.filter.apply(candidates))
    }

    /// Warm-up inference on a blank frame that checks the model's row width
    /// against the catalog. Skipped when no model is loaded.
    pub fn verify_catalog(&mut self, width: u32, height: u32) -> Result<(), CatalogError> {
        if !self.runtime.is_loaded() {
            tracing::warn!("Model not loaded, skipping catalog check");
            return Ok(());
        }

        let output = self
            .runtime
            .infer(&Frame::blank(width, height, 0))
            .map_err(|e| CatalogError::Probe(e.to_string()))?;

        for tensor in &output.tensors {
            let width = decoder::row_width(tensor).map_err(|e| CatalogError::Probe(e.to_string()))?;
            self.catalog.check_row_width(width)?;
        }

        tracing::info!(
            classes = self.catalog.len(),
            "Model output matches class catalog"
        );
        Ok(())
    }
}
