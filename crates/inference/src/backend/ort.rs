use super::{InferenceBackend, InferenceOutput};
use crate::artifact::{ModelArtifact, RuntimeKind};
use crate::config::{ExecutionProvider, InferenceConfig};
use anyhow::Context;
use capture::Frame;
use common::span;
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};
use preprocess::{InputTensor, NativePreProcessor, Preprocess, SquarePreProcessor};

/// ONNX Runtime backend for both dense `.onnx` graphs and `.ort` mobile models.
pub struct OrtBackend {
    session: Session,
    preprocessor: Box<dyn Preprocess>,
    kind: RuntimeKind,
    provider: ExecutionProvider,
}

impl OrtBackend {
    pub fn load(artifact: &ModelArtifact, config: &InferenceConfig) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?;

        match config.execution_provider {
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder
            .commit_from_file(&artifact.path)
            .with_context(|| format!("loading {}", artifact.path.display()))?;

        let preprocessor: Box<dyn Preprocess> = match artifact.kind {
            RuntimeKind::Mobile => Box::new(SquarePreProcessor::new(config.input_size, config.layout)),
            RuntimeKind::DenseGraph => Box::new(NativePreProcessor::new(config.native_layout)),
        };

        tracing::info!(path = %artifact.path.display(), kind = ?artifact.kind, "Model loaded");
        Ok(Self {
            session,
            preprocessor,
            kind: artifact.kind,
            provider: config.execution_provider,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<InferenceOutput> {
        let input = self.preprocessor.preprocess(frame)?;

        let _s = span!("inference");

        let outputs = match &input.tensor {
            InputTensor::F32(arr) => self
                .session
                .run(ort::inputs![TensorRef::from_array_view(arr.view())?])?,
            InputTensor::U8(arr) => self
                .session
                .run(ort::inputs![TensorRef::from_array_view(arr.view())?])?,
        };

        let tensor = outputs[0].try_extract_array::<f32>()?.into_owned();

        Ok(InferenceOutput {
            tensors: vec![tensor],
            input_size: input.input_size,
        })
    }

    fn describe(&self) -> String {
        format!("onnxruntime ({:?}, {:?})", self.kind, self.provider)
    }
}
