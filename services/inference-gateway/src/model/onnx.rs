use std::path::Path;
use tract_onnx::prelude::*;

use super::{Batch, Model};
use crate::error::{InferenceError, LoadError};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxModel {
    plan: Plan,
    input_width: Option<usize>,
    output_width: Option<usize>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel").field("input_width", &self.input_width).field("output_width", &self.output_width).finish()
    }
}

// Last dimension of the first input/output fact, when it is concrete.
fn last_dim(fact: TractResult<&TypedFact>) -> Option<usize> {
    fact.ok().and_then(|f| f.shape.iter().last().and_then(|d| d.to_usize().ok()))
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| LoadError::Backend(e.to_string()))?;
        let input_width = last_dim(plan.model().input_fact(0));
        let output_width = last_dim(plan.model().output_fact(0));
        Ok(Self { plan, input_width, output_width })
    }
}

impl Model for OnnxModel {
    fn input_width(&self) -> Option<usize> { self.input_width }
    fn output_width(&self) -> Option<usize> { self.output_width }

    fn predict(&self, batch: &Batch) -> Result<Batch, InferenceError> {
        if let Some(expected) = self.input_width {
            if batch.width() != expected { return Err(InferenceError::ShapeMismatch { expected, actual: batch.width() }); }
        }
        let backend = |e: anyhow::Error| InferenceError::Backend(e.to_string());
        let tensor = Tensor::from_shape(&[batch.rows(), batch.width()], batch.as_slice()).map_err(backend)?;
        let outputs = self.plan.run(tvec!(tensor.into_tvalue())).map_err(backend)?;
        let view = outputs[0].to_array_view::<f32>().map_err(backend)?;
        let data: Vec<f32> = view.iter().copied().collect();
        if data.iter().any(|v| !v.is_finite()) { return Err(InferenceError::NonFinite); }
        let width = if batch.rows() == 0 { 0 } else { data.len() / batch.rows() };
        Batch::from_rows(batch.rows(), width, data)
    }
}
