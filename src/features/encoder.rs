//! Frozen standardization parameters
//!
//! Computed once from the baseline training batch and reused unchanged by
//! every later retraining, so new inputs stay on the scale the model was
//! calibrated on.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::schema::FeatureSchema;
use crate::error::{Result, RetrainError};

/// Per-column `{mean, std}` pairs, stored as `scaler_params.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderParams {
    pub feature_columns: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl EncoderParams {
    /// Fit mean and population std per column of a raw matrix
    pub fn fit(schema: &FeatureSchema, raw: &Array2<f64>) -> Self {
        let rows = raw.nrows() as f64;
        let mut mean = Vec::with_capacity(raw.ncols());
        let mut std = Vec::with_capacity(raw.ncols());

        for column in raw.axis_iter(Axis(1)) {
            let m = if rows > 0.0 { column.sum() / rows } else { 0.0 };
            let var = if rows > 0.0 {
                column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / rows
            } else {
                0.0
            };
            mean.push(m);
            std.push(safe_scale(var.sqrt()));
        }

        Self {
            feature_columns: schema.columns().to_vec(),
            mean,
            std,
        }
    }

    /// Load from a `scaler_params.json` document
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RetrainError::SchemaMissing(format!(
                "scaler parameters not found at {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let params: EncoderParams = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// The schema these parameters were frozen against
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.feature_columns.clone())
    }

    fn validate(&self) -> Result<()> {
        let n = self.feature_columns.len();
        if n == 0 || self.mean.len() != n || self.std.len() != n {
            return Err(RetrainError::SchemaMissing(format!(
                "scaler parameters are inconsistent: {} columns, {} means, {} stds",
                n,
                self.mean.len(),
                self.std.len()
            )));
        }
        Ok(())
    }

    /// Ensure these parameters describe exactly `schema`
    pub fn check_against(&self, schema: &FeatureSchema) -> Result<()> {
        if self.feature_columns.as_slice() != schema.columns() {
            return Err(RetrainError::SchemaMissing(format!(
                "encoder columns ({}) do not match feature schema ({})",
                self.feature_columns.len(),
                schema.len()
            )));
        }
        self.validate()
    }

    /// Standardize a raw matrix in place: `(x - mean) / std`
    pub fn apply(&self, raw: &mut Array2<f64>) {
        for (j, mut column) in raw.axis_iter_mut(Axis(1)).enumerate() {
            let mean = self.mean[j];
            let std = safe_scale(self.std[j]);
            column.mapv_inplace(|x| (x - mean) / std);
        }
    }
}

/// Constant columns keep unit scale instead of dividing by zero
fn safe_scale(std: f64) -> f64 {
    if std.is_finite() && std > 0.0 {
        std
    } else {
        1.0
    }
}
