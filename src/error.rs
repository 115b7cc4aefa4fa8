//! Error taxonomy for the retraining pipeline
//!
//! Fatal variants abort the run and end up in the `error` field of the
//! final [`RetrainOutcome`](crate::types::RetrainOutcome). `ExportFailure` is
//! the one variant the pipeline reports without failing the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while retraining and publishing a model
#[derive(Debug, Error)]
pub enum RetrainError {
    /// No labeled feedback rows could be read
    #[error("No feedback data available for retraining: {0}")]
    DataUnavailable(String),

    /// A frozen schema or encoder is required but absent or inconsistent
    #[error("Feature schema unavailable: {0}")]
    SchemaMissing(String),

    /// Fine-tuning was requested without a trained base model
    #[error("Base model not found at {}", .0.display())]
    BaseModelMissing(PathBuf),

    /// The numeric engine failed during fit or fine-tune
    #[error("Training failed: {0}")]
    TrainingFailure(String),

    /// The promotion gate rejected the candidate
    #[error("New model accuracy ({new:.4}) not better than current model ({current:.4})")]
    NotBetterThanCurrent { current: f64, new: f64 },

    /// Writing the version directory failed; nothing was published
    #[error("Publish failed: {0}")]
    PublishFailure(String),

    /// Secondary-format conversion failed after the primary publish
    #[error("Export failed: {0}")]
    ExportFailure(String),

    #[error("Feedback store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RetrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_mentions_both_accuracies() {
        let err = RetrainError::NotBetterThanCurrent { current: 0.95, new: 0.93 };
        let msg = err.to_string();
        assert!(msg.contains("not better than current"));
        assert!(msg.contains("0.9500"));
        assert!(msg.contains("0.9300"));
    }

    #[test]
    fn test_base_model_missing_shows_path() {
        let err = RetrainError::BaseModelMissing(PathBuf::from("/models/current/fraud_detection_model.json"));
        assert!(err.to_string().contains("/models/current/fraud_detection_model.json"));
    }
}
