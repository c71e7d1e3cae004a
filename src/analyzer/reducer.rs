use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Fitted vector-to-vector projection applied at inference time.
pub trait Reducer: Send + Sync {
    fn input_dim(&self) -> usize;
    fn output_dim(&self) -> usize;

    /// Project one vector; `input.len()` must equal `input_dim()`.
    fn transform(&self, input: &[f32]) -> Vec<f32>;

    fn transform_batch(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let expected = self.input_dim();
        if let Some(bad) = inputs.iter().find(|v| v.len() != expected) {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(inputs.par_iter().map(|v| self.transform(v)).collect())
    }
}

/// Apply the reducer when one was loaded; otherwise hand the vectors back untouched.
pub fn reduce(
    reducer: Option<&dyn Reducer>,
    features: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    match reducer {
        Some(r) => r.transform_batch(&features),
        None => Ok(features),
    }
}

/// Fitted PCA state: `mean[d]`, `components[k][d]`, optional whitening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaModel {
    pub mean: Vec<f32>,
    pub components: Vec<Vec<f32>>,
    #[serde(default)]
    pub explained_variance: Option<Vec<f32>>,
    #[serde(default)]
    pub whiten: bool,
}

impl PcaModel {
    pub fn validate(&self) -> Result<(), String> {
        let d = self.mean.len();
        if d == 0 {
            return Err("mean is empty".into());
        }
        if self.components.is_empty() {
            return Err("no components".into());
        }
        if let Some((i, row)) = self.components.iter().enumerate().find(|(_, r)| r.len() != d) {
            return Err(format!("component {i} has length {}, expected {d}", row.len()));
        }
        if self.whiten {
            let Some(var) = self.explained_variance.as_ref() else {
                return Err("whiten is set but explained_variance is missing".into());
            };
            if var.len() != self.components.len() {
                return Err(format!(
                    "explained_variance has length {}, expected {}",
                    var.len(),
                    self.components.len()
                ));
            }
            if var.iter().any(|&v| v <= 0.0) {
                return Err("explained_variance must be positive when whitening".into());
            }
        }
        Ok(())
    }
}

impl Reducer for PcaModel {
    fn input_dim(&self) -> usize {
        self.mean.len()
    }

    fn output_dim(&self) -> usize {
        self.components.len()
    }

    fn transform(&self, input: &[f32]) -> Vec<f32> {
        let scale = self.explained_variance.as_ref().filter(|_| self.whiten);

        self.components
            .iter()
            .enumerate()
            .map(|(k, component)| {
                let dot: f64 = input
                    .iter()
                    .zip(&self.mean)
                    .zip(component)
                    .map(|((&x, &m), &c)| (x as f64 - m as f64) * c as f64)
                    .sum();
                match scale {
                    Some(var) => (dot / (var[k] as f64).sqrt()) as f32,
                    None => dot as f32,
                }
            })
            .collect()
    }
}
