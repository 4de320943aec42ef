//! Model runtime: the loaded-handle abstraction and the artifact formats behind it.
//!
//! Artifacts are picked by file extension:
//! - `*.json` dense feed-forward network (always available)
//! - `*.onnx` graph run through tract (`onnx` feature)

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::error::{InferenceError, LoadError};

mod dense;
#[cfg(feature = "onnx")] mod onnx;

pub use dense::{Activation, DenseLayer, DenseModel, DENSE_FORMAT};
#[cfg(feature = "onnx")] pub use onnx::OnnxModel;

/// Shared, read-only handle to a loaded model.
pub type ModelHandle = Arc<dyn Model>;

/// Row-major `f32` matrix fed to and returned from inference.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    rows: usize,
    width: usize,
    data: Vec<f32>,
}

impl Batch {
    /// One-row batch; the row width is whatever the caller sent.
    pub fn single_row(features: &[f32]) -> Self { Self { rows: 1, width: features.len(), data: features.to_vec() } }

    pub fn from_rows(rows: usize, width: usize, data: Vec<f32>) -> Result<Self, InferenceError> {
        if rows * width != data.len() { return Err(InferenceError::ShapeMismatch { expected: rows * width, actual: data.len() }); }
        Ok(Self { rows, width, data })
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn width(&self) -> usize { self.width }
    pub fn as_slice(&self) -> &[f32] { &self.data }

    pub fn row(&self, idx: usize) -> Option<&[f32]> {
        if idx >= self.rows { return None; }
        let start = idx * self.width;
        Some(&self.data[start..start + self.width])
    }
}

/// Batched numeric inference over fixed-width input.
///
/// Implementations are evaluated concurrently through `&self` and never mutated after load.
pub trait Model: Send + Sync + Debug {
    /// Input row width the model was built for, when the format records it.
    fn input_width(&self) -> Option<usize>;
    fn output_width(&self) -> Option<usize>;
    fn predict(&self, batch: &Batch) -> Result<Batch, InferenceError>;
}

/// Reads an artifact from disk into a handle. Blocking; callers on the async side use `spawn_blocking`.
pub fn load_model(path: &Path) -> Result<ModelHandle, LoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "json" => Ok(Arc::new(DenseModel::load(path)?)),
        #[cfg(feature = "onnx")]
        "onnx" => Ok(Arc::new(OnnxModel::load(path)?)),
        other => Err(LoadError::UnsupportedFormat(other.to_string())),
    }
}
