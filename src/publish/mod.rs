//! Versioned artifact publication
//!
//! Phase one writes every document of a version into a staging directory
//! and renames it into place, so a version directory is either complete or
//! absent. Phase two, the secondary export, runs afterwards and can never
//! undo phase one.

pub mod export;
pub mod registry;

pub use export::Exporter;
pub use registry::{ModelDir, ModelRegistry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, RetrainError};
use crate::features::{EncoderParams, FeatureSchema, REQUIRED_FIELDS};
use crate::model::{Classifier, DenseNetwork};
use crate::types::{MetricSet, ModelKind};

pub const MODEL_FILE: &str = "fraud_detection_model.json";
pub const ENCODER_FILE: &str = "scaler_params.json";
pub const SCHEMA_FILE: &str = "feature_schema.json";
pub const CONFIG_FILE: &str = "model_config.json";
/// Subdirectory of a version that receives the secondary export
pub const EXPORT_DIR: &str = "web_model";

const STAGING_PREFIX: &str = ".staging-";

/// Metadata document written as `model_config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub feature_columns: Vec<String>,
    pub feature_count: usize,
    pub input_shape: Vec<usize>,
    pub threshold: f64,
    pub note: String,
    pub required_fields: Vec<String>,
    pub metrics: MetricSet,
    pub model_type: String,
    pub model_kind: ModelKind,
    pub is_baseline: bool,
}

/// Everything that goes into one version directory
pub struct PublishRequest<'a> {
    pub model: &'a DenseNetwork,
    pub metrics: &'a MetricSet,
    pub schema: &'a FeatureSchema,
    pub encoder: &'a EncoderParams,
    pub kind: ModelKind,
    pub is_baseline: bool,
}

/// A version that is now durable on disk
#[derive(Debug, Clone)]
pub struct PublishedVersion {
    pub version: String,
    pub dir: PathBuf,
    pub metadata: ModelMetadata,
}

impl PublishedVersion {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.dir.join(EXPORT_DIR)
    }
}

/// Version identifier with second resolution
pub fn version_for(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Writes accepted models as immutable version directories
pub struct ArtifactPublisher {
    destination: PathBuf,
    threshold: f64,
}

impl ArtifactPublisher {
    pub fn new<P: AsRef<Path>>(destination: P, threshold: f64) -> Self {
        Self {
            destination: destination.as_ref().to_path_buf(),
            threshold,
        }
    }

    /// Publish under a version derived from the current time
    pub fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishedVersion> {
        self.publish_at(request, Utc::now())
    }

    /// Publish under the version derived from `now`
    ///
    /// Fails with `PublishFailure` if that version already exists; nothing
    /// is left behind on failure.
    pub fn publish_at(&self, request: &PublishRequest<'_>, now: DateTime<Utc>) -> Result<PublishedVersion> {
        let version = version_for(now);
        let final_dir = self.destination.join(&version);
        if final_dir.exists() {
            return Err(RetrainError::PublishFailure(format!(
                "version {} already exists at {}",
                version,
                final_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.destination).map_err(|e| {
            RetrainError::PublishFailure(format!(
                "cannot create destination {}: {}",
                self.destination.display(),
                e
            ))
        })?;

        let staging = self.destination.join(format!("{}{}", STAGING_PREFIX, version));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }

        let metadata = self.metadata(request, &version, now);
        let written = std::fs::create_dir(&staging)
            .map_err(RetrainError::from)
            .and_then(|_| write_documents(&staging, request, &metadata))
            .and_then(|_| std::fs::rename(&staging, &final_dir).map_err(RetrainError::from));

        if let Err(e) = written {
            if staging.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!(dir = %staging.display(), error = %cleanup, "Failed to remove staging directory");
                }
            }
            return Err(RetrainError::PublishFailure(e.to_string()));
        }

        info!(version = %version, dir = %final_dir.display(), "Published model version");

        Ok(PublishedVersion {
            version,
            dir: final_dir,
            metadata,
        })
    }

    fn metadata(&self, request: &PublishRequest<'_>, version: &str, now: DateTime<Utc>) -> ModelMetadata {
        let columns = request.schema.columns().to_vec();
        ModelMetadata {
            version: version.to_string(),
            created_at: now,
            feature_count: columns.len(),
            input_shape: vec![request.model.input_dim(), 1],
            feature_columns: columns,
            threshold: self.threshold,
            note: "Input features must be standardized using the scaler parameters".to_string(),
            required_fields: REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
            metrics: request.metrics.clone(),
            model_type: request.model.model_type().to_string(),
            model_kind: request.kind,
            is_baseline: request.is_baseline,
        }
    }
}

fn write_documents(dir: &Path, request: &PublishRequest<'_>, metadata: &ModelMetadata) -> Result<()> {
    request.model.save(&dir.join(MODEL_FILE))?;
    request.encoder.save(&dir.join(ENCODER_FILE))?;
    std::fs::write(dir.join(SCHEMA_FILE), serde_json::to_string_pretty(request.schema)?)?;
    std::fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(metadata)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixture {
        model: DenseNetwork,
        metrics: MetricSet,
        schema: FeatureSchema,
        encoder: EncoderParams,
    }

    fn fixture() -> Fixture {
        let schema = FeatureSchema::new(vec!["amt".into(), "hour".into(), "travel".into()]);
        Fixture {
            model: DenseNetwork::new(3, 4, 42),
            metrics: MetricSet {
                training_samples: 400,
                test_samples: 100,
                ..MetricSet::with_accuracy(0.93)
            },
            encoder: EncoderParams {
                feature_columns: schema.columns().to_vec(),
                mean: vec![50.0, 12.0, 0.2],
                std: vec![20.0, 6.0, 0.4],
            },
            schema,
        }
    }

    fn request(f: &Fixture) -> PublishRequest<'_> {
        PublishRequest {
            model: &f.model,
            metrics: &f.metrics,
            schema: &f.schema,
            encoder: &f.encoder,
            kind: ModelKind::Fresh,
            is_baseline: true,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 22, 33).unwrap()
    }

    #[test]
    fn test_version_format() {
        assert_eq!(version_for(at()), "20261019_142233");
    }

    #[test]
    fn test_publish_writes_complete_version() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture();
        let publisher = ArtifactPublisher::new(dir.path(), 0.5);
        let published = publisher.publish_at(&request(&f), at()).unwrap();

        assert_eq!(published.version, "20261019_142233");
        for file in [MODEL_FILE, ENCODER_FILE, SCHEMA_FILE, CONFIG_FILE] {
            assert!(published.dir.join(file).is_file(), "missing {}", file);
        }

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "staging directory left behind");

        let metadata: ModelMetadata =
            serde_json::from_str(&std::fs::read_to_string(published.dir.join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(metadata.feature_count, 3);
        assert_eq!(metadata.input_shape, vec![3, 1]);
        assert_eq!(metadata.model_kind, ModelKind::Fresh);
        assert!(metadata.is_baseline);
        assert_eq!(metadata.metrics.training_samples + metadata.metrics.test_samples, 500);

        let model_dir = ModelDir::new(&published.dir);
        assert_eq!(model_dir.load_model().unwrap(), f.model);
        let (schema, encoder) = model_dir.load_frozen().unwrap();
        assert_eq!(schema, f.schema);
        assert_eq!(encoder, f.encoder);
        assert_eq!(model_dir.load_metrics().unwrap().accuracy, 0.93);
    }

    #[test]
    fn test_existing_version_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture();
        let publisher = ArtifactPublisher::new(dir.path(), 0.5);
        let first = publisher.publish_at(&request(&f), at()).unwrap();
        let before = std::fs::read_to_string(first.dir.join(CONFIG_FILE)).unwrap();

        let err = publisher.publish_at(&request(&f), at()).unwrap_err();
        assert!(matches!(err, RetrainError::PublishFailure(_)));
        assert_eq!(std::fs::read_to_string(first.dir.join(CONFIG_FILE)).unwrap(), before);
    }

    #[test]
    fn test_publish_creates_missing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture();
        let dest = dir.path().join("models").join("fraud");
        let published = ArtifactPublisher::new(&dest, 0.5).publish_at(&request(&f), at()).unwrap();
        assert!(published.dir.starts_with(&dest));
        assert_eq!(ModelRegistry::open(&dest).versions().unwrap(), vec!["20261019_142233"]);
    }
}
