//! Dense feed-forward regression network stored as a JSON artifact.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Batch, Model};
use crate::error::{InferenceError, LoadError};

pub const DENSE_FORMAT: &str = "dense-v1";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Activation { #[default] Linear, Relu, Sigmoid, Tanh }

impl Activation {
    fn apply(self, v: f32) -> f32 {
        match self {
            Activation::Linear => v,
            // NaN must survive so overflow upstream is still reported
            Activation::Relu => if v.is_nan() || v > 0.0 { v } else { 0.0 },
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Activation::Tanh => v.tanh(),
        }
    }
}

/// Fully connected layer; `weights` is laid out `[input][output]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn inputs(&self) -> usize { self.weights.len() }
    pub fn outputs(&self) -> usize { self.bias.len() }

    fn forward(&self, x: &[f32], out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.bias);
        for (xi, row) in x.iter().zip(&self.weights) {
            for (o, w) in out.iter_mut().zip(row) { *o += xi * w; }
        }
        for o in out.iter_mut() { *o = self.activation.apply(*o); }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseModel {
    format: String,
    input_width: usize,
    layers: Vec<DenseLayer>,
}

impl DenseModel {
    pub fn new(input_width: usize, layers: Vec<DenseLayer>) -> Result<Self, LoadError> {
        let model = Self { format: DENSE_FORMAT.to_string(), input_width, layers };
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)?;
        let model: DenseModel = serde_json::from_slice(&bytes)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn layers(&self) -> &[DenseLayer] { &self.layers }

    fn validate(&self) -> Result<(), LoadError> {
        let invalid = |msg: String| Err(LoadError::InvalidArtifact(msg));
        if self.format != DENSE_FORMAT { return invalid(format!("format '{}' is not '{DENSE_FORMAT}'", self.format)); }
        if self.input_width == 0 { return invalid("input_width must be positive".into()); }
        if self.layers.is_empty() { return invalid("model has no layers".into()); }
        let mut width = self.input_width;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.inputs() != width { return invalid(format!("layer {idx} expects {} inputs, previous width is {width}", layer.inputs())); }
            if layer.outputs() == 0 { return invalid(format!("layer {idx} has no outputs")); }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != layer.outputs()) {
                return invalid(format!("layer {idx} weight row {row} does not match bias length {}", layer.outputs()));
            }
            width = layer.outputs();
        }
        Ok(())
    }
}

impl Model for DenseModel {
    fn input_width(&self) -> Option<usize> { Some(self.input_width) }

    fn output_width(&self) -> Option<usize> { self.layers.last().map(DenseLayer::outputs) }

    fn predict(&self, batch: &Batch) -> Result<Batch, InferenceError> {
        if batch.width() != self.input_width {
            return Err(InferenceError::ShapeMismatch { expected: self.input_width, actual: batch.width() });
        }
        let out_width = self.output_width().unwrap_or(0);
        let mut out = Vec::with_capacity(batch.rows() * out_width);
        let (mut cur, mut next) = (Vec::new(), Vec::new());
        for r in 0..batch.rows() {
            cur.clear();
            cur.extend_from_slice(batch.row(r).unwrap_or_default());
            for layer in &self.layers {
                layer.forward(&cur, &mut next);
                std::mem::swap(&mut cur, &mut next);
            }
            if cur.iter().any(|v| !v.is_finite()) { return Err(InferenceError::NonFinite); }
            out.extend_from_slice(&cur);
        }
        Batch::from_rows(batch.rows(), out_width, out)
    }
}
