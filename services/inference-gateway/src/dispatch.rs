use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{InferenceError, PredictError};
use crate::model::Batch;
use crate::registry::{ModelRegistry, DEFAULT_KEY};

/// Turns a feature vector into a one-row batch, runs the default model and hands back the row.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModelRegistry>) -> Self { Self { registry } }

    pub fn registry(&self) -> &Arc<ModelRegistry> { &self.registry }

    /// Blocking: may load the artifact on first use.
    #[instrument(skip(self, features), fields(features.len = features.len()))]
    pub fn predict(&self, features: &[f32]) -> Result<Vec<f32>, PredictError> {
        let model = self.registry.get_or_load(DEFAULT_KEY)?
            .ok_or_else(|| PredictError::ModelUnavailable { path: self.registry.artifact_path(DEFAULT_KEY) })?;
        // width is left to the model; a mismatch comes back as an inference error
        let out = model.predict(&Batch::single_row(features))?;
        let row = out.row(0).ok_or(InferenceError::ShapeMismatch { expected: 1, actual: out.rows() })?;
        debug!(outputs = row.len(), "prediction_done");
        Ok(row.to_vec())
    }

    /// `predict` on the blocking pool.
    pub async fn predict_blocking(&self, features: Vec<f32>) -> Result<Vec<f32>, PredictError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.predict(&features))
            .await
            .map_err(|e| PredictError::TaskFailed(e.to_string()))?
    }
}
