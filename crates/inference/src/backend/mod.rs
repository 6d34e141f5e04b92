use crate::artifact::ModelArtifact;
use crate::config::InferenceConfig;
use capture::Frame;
use ndarray::ArrayD;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// A loaded model that can run one frame at a time.
pub trait InferenceBackend: Send {
    /// Preprocess `frame`, execute the model and return its raw outputs.
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<InferenceOutput>;

    fn describe(&self) -> String;
}

/// Raw model outputs plus the image size the model saw.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub tensors: Vec<ArrayD<f32>>,
    pub input_size: (u32, u32),
}

impl InferenceOutput {
    pub fn empty(input_size: (u32, u32)) -> Self {
        Self {
            tensors: Vec::new(),
            input_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { backend: String },
    Unloaded { reason: String },
}

/// Owns the active backend, or nothing if loading failed.
///
/// An unloaded runtime stays unloaded and answers every call with an empty
/// output, which decodes to zero detections.
pub struct ModelRuntime {
    backend: Option<Box<dyn InferenceBackend>>,
    status: LoadStatus,
}

impl ModelRuntime {
    /// Load the configured model. Never fails; check [`ModelRuntime::status`].
    pub fn load(config: &InferenceConfig) -> Self {
        let Some(path) = &config.model_path else {
            tracing::warn!("No model configured, inference disabled");
            return Self::unloaded("no model configured");
        };

        let artifact = match ModelArtifact::resolve(path) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Model artifact not found");
                return Self::unloaded(e.to_string());
            }
        };

        match load_backend(&artifact, config) {
            Ok(backend) => Self::with_backend(backend),
            Err(e) => {
                tracing::error!(
                    path = %artifact.path.display(),
                    error = %e,
                    "Failed to load model, inference disabled"
                );
                Self::unloaded(e.to_string())
            }
        }
    }

    pub fn with_backend(backend: Box<dyn InferenceBackend>) -> Self {
        let status = LoadStatus::Loaded {
            backend: backend.describe(),
        };
        tracing::info!(backend = %backend.describe(), "Inference backend ready");
        Self {
            backend: Some(backend),
            status,
        }
    }

    pub fn unloaded(reason: impl Into<String>) -> Self {
        Self {
            backend: None,
            status: LoadStatus::Unloaded {
                reason: reason.into(),
            },
        }
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn infer(&mut self, frame: &Frame) -> anyhow::Result<InferenceOutput> {
        match self.backend.as_mut() {
            Some(backend) => backend.infer(frame),
            None => Ok(InferenceOutput::empty((frame.width(), frame.height()))),
        }
    }
}

#[cfg(feature = "ort-backend")]
fn load_backend(
    artifact: &ModelArtifact,
    config: &InferenceConfig,
) -> anyhow::Result<Box<dyn InferenceBackend>> {
    Ok(Box::new(ort::OrtBackend::load(artifact, config)?))
}

#[cfg(not(feature = "ort-backend"))]
fn load_backend(
    artifact: &ModelArtifact,
    _config: &InferenceConfig,
) -> anyhow::Result<Box<dyn InferenceBackend>> {
    anyhow::bail!(
        "built without an inference runtime, cannot load {}",
        artifact.path.display()
    )
}
