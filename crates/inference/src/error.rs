use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("output tensor must be 2-D after squeezing batch dims, got shape {0:?}")]
    Rank(Vec<usize>),

    #[error("output row width {actual} does not match 4 + {classes} classes")]
    WidthMismatch { actual: usize, classes: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("class catalog is empty")]
    Empty,

    #[error("{defect_classes} defect classes declared but catalog only has {len} entries")]
    TooManyDefects { defect_classes: usize, len: usize },

    #[error("class name {0:?} appears more than once")]
    Duplicate(String),

    #[error("required component {0:?} is not in the catalog")]
    MissingComponent(&'static str),

    #[error("required component {0:?} is listed as a defect class")]
    ComponentIsDefect(&'static str),

    #[error("model emits rows of width {actual}, catalog expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("warm-up inference failed: {0}")]
    Probe(String),
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("no model artifact found at {0}")]
    NotFound(PathBuf),

    #[error("unsupported model file {0} (expected .onnx or .ort)")]
    Unsupported(PathBuf),

    #[error("failed to scan model directory: {0}")]
    Io(#[from] std::io::Error),
}
