use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading model artifact failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("model artifact is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("unsupported model format '{0}'")]
    UnsupportedFormat(String),
    #[error("model backend failed to load artifact: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("inference produced a non-finite value")]
    NonFinite,
    #[error("model backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no model artifact at {}", path.display())]
    ModelUnavailable { path: PathBuf },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("prediction task failed: {0}")]
    TaskFailed(String),
}
