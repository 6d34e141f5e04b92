use crate::error::ArtifactError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const DENSE_EXT: &str = "onnx";
const MOBILE_EXT: &str = "ort";

/// Which runtime a model file needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Full ONNX graph; takes the frame at its native size.
    DenseGraph,
    /// Compact ORT-format model with a fixed square input.
    Mobile,
}

/// A resolved model file.
///
/// Weights stored next to an ONNX graph (external data) are picked up by the
/// runtime from the graph's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub kind: RuntimeKind,
}

impl ModelArtifact {
    /// Resolve a file, a directory, or a file prefix to a loadable model.
    ///
    /// Directories prefer `model.onnx`, then any `.onnx`, then any `.ort`
    /// (alphabetical). Prefixes try `<prefix>.onnx` then `<prefix>.ort`.
    pub fn resolve(path: &Path) -> Result<Self, ArtifactError> {
        if path.is_file() {
            return Self::from_file(path);
        }

        if path.is_dir() {
            return Self::from_dir(path);
        }

        for ext in [DENSE_EXT, MOBILE_EXT] {
            let mut candidate = OsString::from(path.as_os_str());
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        Err(ArtifactError::NotFound(path.to_path_buf()))
    }

    fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some(DENSE_EXT) => RuntimeKind::DenseGraph,
            Some(MOBILE_EXT) => RuntimeKind::Mobile,
            _ => return Err(ArtifactError::Unsupported(path.to_path_buf())),
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }

    fn from_dir(dir: &Path) -> Result<Self, ArtifactError> {
        let preferred = dir.join("model.onnx");
        if preferred.is_file() {
            return Self::from_file(&preferred);
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        for ext in [DENSE_EXT, MOBILE_EXT] {
            if let Some(found) = files
                .iter()
                .find(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
            {
                return Self::from_file(found);
            }
        }

        Err(ArtifactError::NotFound(dir.to_path_buf()))
    }
}
