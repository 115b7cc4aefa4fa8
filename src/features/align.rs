//! Feature alignment
//!
//! Turns labeled records into a matrix whose columns are exactly the frozen
//! schema, in order. Categories seen in a batch but unknown to the schema
//! are dropped; schema categories missing from a batch become zero columns.

use ndarray::{Array1, Array2};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::encoder::EncoderParams;
use super::schema::{is_numeric_feature, numeric_value, FeatureSchema};
use crate::error::{Result, RetrainError};
use crate::types::FeedbackRecord;

/// Output of [`FeatureAligner::align`]
#[derive(Debug, Clone)]
pub struct AlignedFeatures {
    /// Standardized features, one row per record, schema column order
    pub matrix: Array2<f32>,
    /// 1.0 for fraud, 0.0 for legitimate
    pub labels: Array1<f32>,
    /// The encoder used, either the supplied frozen one or a newly fitted one
    pub encoder: EncoderParams,
    /// True when `encoder` was fitted from this batch
    pub encoder_fitted: bool,
}

/// Aligns feedback batches against a frozen schema
pub struct FeatureAligner<'a> {
    schema: &'a FeatureSchema,
}

impl<'a> FeatureAligner<'a> {
    pub fn new(schema: &'a FeatureSchema) -> Self {
        Self { schema }
    }

    /// Align, standardize and cast `records`
    ///
    /// With `encoder` the frozen parameters are applied as-is. Without one,
    /// parameters are fitted on this batch and returned for future runs.
    pub fn align(
        &self,
        records: &[FeedbackRecord],
        encoder: Option<&EncoderParams>,
    ) -> Result<AlignedFeatures> {
        if self.schema.is_empty() {
            return Err(RetrainError::SchemaMissing("feature schema has no columns".to_string()));
        }
        if let Some(params) = encoder {
            params.check_against(self.schema)?;
        }

        let mut raw = self.raw_matrix(records);

        let (encoder, encoder_fitted) = match encoder {
            Some(params) => (params.clone(), false),
            None => (EncoderParams::fit(self.schema, &raw), true),
        };
        encoder.apply(&mut raw);

        let matrix = raw.mapv(|x| x as f32);
        let labels = records
            .iter()
            .map(|r| if r.label { 1.0f32 } else { 0.0f32 })
            .collect::<Array1<f32>>();

        debug!(
            rows = matrix.nrows(),
            columns = matrix.ncols(),
            encoder_fitted,
            "Aligned feature matrix"
        );

        Ok(AlignedFeatures {
            matrix,
            labels,
            encoder,
            encoder_fitted,
        })
    }

    /// One-hot encode and reorder into schema columns, before scaling
    fn raw_matrix(&self, records: &[FeedbackRecord]) -> Array2<f64> {
        let columns = self.schema.columns();

        // Indicator column per distinct category seen in this batch
        let observed: BTreeSet<&str> = records.iter().map(|r| r.category.as_str()).collect();
        let indicator: HashMap<&str, usize> = observed
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i))
            .collect();

        let dropped: Vec<&str> = observed
            .iter()
            .copied()
            .filter(|c| !self.schema.categories().any(|known| known == *c))
            .collect();
        if !dropped.is_empty() {
            warn!(categories = ?dropped, "Dropping categories absent from the frozen schema");
        }

        let mut raw = Array2::<f64>::zeros((records.len(), columns.len()));
        for (i, record) in records.iter().enumerate() {
            let category_slot = indicator.get(record.category.as_str()).copied();
            for (j, name) in columns.iter().enumerate() {
                raw[[i, j]] = if is_numeric_feature(name) {
                    numeric_value(record, name).unwrap_or(0.0)
                } else {
                    match (indicator.get(name.as_str()), category_slot) {
                        (Some(slot), Some(own)) if *slot == own => 1.0,
                        _ => 0.0,
                    }
                };
            }
        }

        raw
    }
}
