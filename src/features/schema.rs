//! Frozen feature schema
//!
//! Column names use the store's wire names for numeric fields and the bare
//! category value for one-hot indicators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::FeedbackRecord;

/// Numeric columns, in baseline order
pub const NUMERIC_FEATURES: &[&str] = &["amt", "hour", "month", "dayofweek", "day"];

/// Raw fields a scoring client must supply
pub const REQUIRED_FIELDS: &[&str] = &["amt", "hour", "month", "dayofweek", "day", "category"];

/// Ordered column names every aligned matrix must follow exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    #[serde(rename = "feature_columns")]
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Baseline schema: numeric columns followed by sorted distinct categories
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let categories: BTreeSet<&str> = records.iter().map(|r| r.category.as_str()).collect();

        let columns = NUMERIC_FEATURES
            .iter()
            .map(|s| s.to_string())
            .chain(
                categories
                    .into_iter()
                    .filter(|c| !NUMERIC_FEATURES.contains(c))
                    .map(str::to_string),
            )
            .collect();

        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Category indicator columns, in schema order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| !is_numeric_feature(c))
    }
}

pub fn is_numeric_feature(name: &str) -> bool {
    NUMERIC_FEATURES.contains(&name)
}

/// Read a numeric feature from a record by its column name
pub fn numeric_value(record: &FeedbackRecord, name: &str) -> Option<f64> {
    match name {
        "amt" => Some(record.amount),
        "hour" => Some(f64::from(record.hour)),
        "month" => Some(f64::from(record.month)),
        "dayofweek" => Some(f64::from(record.day_of_week)),
        "day" => Some(f64::from(record.day)),
        _ => None,
    }
}
