//! Shared types used across modules
//!
//! Records, metrics and decisions flow between the feedback, training,
//! promotion and publish stages, so they live here to keep those modules
//! free of cross-dependencies.

use serde::{Deserialize, Serialize};

/// A scored transaction that a reviewer later labeled as fraud or legitimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub amount: f64,
    pub hour: u8,
    pub month: u8,
    pub day_of_week: u8,
    pub day: u8,
    pub category: String,
    pub label: bool,
}

impl FeedbackRecord {
    /// Check calendar fields against their documented ranges
    pub fn is_valid(&self) -> bool {
        self.hour <= 23
            && (1..=12).contains(&self.month)
            && self.day_of_week <= 6
            && (1..=31).contains(&self.day)
            && self.amount.is_finite()
    }
}

/// Which training strategy produced a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Fresh,
    FineTuned,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Fresh => write!(f, "fresh"),
            ModelKind::FineTuned => write!(f, "fine_tuned"),
        }
    }
}

/// Evaluation metrics recorded with every published model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub accuracy: f64,
    /// Binary cross-entropy on the held-out split
    #[serde(default)]
    pub loss: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    #[serde(default)]
    pub training_samples: usize,
    #[serde(default)]
    pub test_samples: usize,
}

#[cfg(test)]
impl MetricSet {
    /// Metrics carrying only an accuracy
    pub fn with_accuracy(accuracy: f64) -> Self {
        Self {
            accuracy,
            loss: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            auc: 0.0,
            training_samples: 0,
            test_samples: 0,
        }
    }
}

/// Outcome of comparing a candidate against the published model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub accepted: bool,
    pub current_accuracy: Option<f64>,
    pub new_accuracy: f64,
    pub improvement: Option<f64>,
    pub reason: Option<String>,
}

/// Result of the best-effort secondary export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The single machine-readable result of a retraining run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_kind: Option<ModelKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_before: Option<MetricSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub improvement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrainOutcome {
    /// Outcome for a run that aborted before publishing
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Process exit code for an orchestrating caller
    pub fn exit_code(&self) -> i32 {
        if self.success { 0 } else { 1 }
    }

    /// The `RESULT_JSON:` line consumed by the caller
    pub fn to_result_line(&self) -> String {
        let json = serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{}\"}}", e));
        format!("RESULT_JSON: {}", json)
    }
}
