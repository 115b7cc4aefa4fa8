//! Numeric classification engine
//!
//! The pipeline only needs probabilities from a model; training specifics
//! stay with the concrete network.

pub mod network;

pub use network::{mean_bce, DenseNetwork, FitOptions, TrainingOutput, MODEL_TYPE};

use ndarray::{Array1, Array2};

use crate::error::Result;

/// A trained binary classifier
pub trait Classifier {
    /// Number of feature columns the model was built for
    fn input_dim(&self) -> usize;

    /// Fraud probability per row
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>>;

    /// Hard labels at `threshold` (strictly greater counts as fraud)
    fn predict(&self, x: &Array2<f32>, threshold: f64) -> Result<Array1<f32>> {
        let p = self.predict_proba(x)?;
        Ok(p.mapv(|v| if f64::from(v) > threshold { 1.0 } else { 0.0 }))
    }
}
