//! Published model lookup
//!
//! A model directory holds one version's documents. A publish root holds
//! many version directories named by timestamp; the newest is current.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{CONFIG_FILE, ENCODER_FILE, MODEL_FILE, SCHEMA_FILE};
use crate::error::{Result, RetrainError};
use crate::features::{EncoderParams, FeatureSchema};
use crate::model::DenseNetwork;
use crate::types::MetricSet;

/// Looks up the currently published model under a directory
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Version directory names under the root, oldest first
    pub fn versions(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_version_name(&name) {
                versions.push(name);
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// The current model: the newest version directory under the root, or
    /// the root itself when it holds a model but no versions
    pub fn current(&self) -> Result<Option<ModelDir>> {
        if let Some(version) = self.versions()?.pop() {
            let dir = ModelDir::new(self.root.join(version));
            debug!(dir = %dir.path().display(), "Using latest published version as current model");
            return Ok(Some(dir));
        }

        let direct = ModelDir::new(&self.root);
        if direct.is_model_dir() {
            debug!(dir = %self.root.display(), "Using directory as current model");
            return Ok(Some(direct));
        }
        Ok(None)
    }
}

/// `YYYYMMDD_HHMMSS`
pub fn is_version_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

/// Only the parts of `model_config.json` needed to compare against
#[derive(Deserialize)]
struct RecordedConfig {
    #[serde(default)]
    version: Option<String>,
    metrics: MetricSet,
}

/// Documents of a single published model
#[derive(Debug, Clone)]
pub struct ModelDir {
    path: PathBuf,
}

impl ModelDir {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model_path(&self) -> PathBuf {
        self.path.join(MODEL_FILE)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.path.join(ENCODER_FILE)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.path.join(SCHEMA_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE)
    }

    pub fn is_model_dir(&self) -> bool {
        self.model_path().is_file() || self.config_path().is_file()
    }

    pub fn has_model(&self) -> bool {
        self.model_path().is_file()
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder_path().is_file()
    }

    pub fn load_model(&self) -> Result<DenseNetwork> {
        let path = self.model_path();
        if !path.is_file() {
            return Err(RetrainError::BaseModelMissing(path));
        }
        info!(path = %path.display(), "Loading base model");
        DenseNetwork::load(&path)
    }

    /// Frozen encoder plus the schema it was fitted against
    ///
    /// `feature_schema.json` is authoritative when present; directories
    /// without it take the schema from the encoder's own column list.
    pub fn load_frozen(&self) -> Result<(FeatureSchema, EncoderParams)> {
        let encoder = EncoderParams::load(&self.encoder_path())?;

        let schema_path = self.schema_path();
        let schema = if schema_path.is_file() {
            let contents = std::fs::read_to_string(&schema_path)?;
            serde_json::from_str::<FeatureSchema>(&contents)?
        } else {
            encoder.schema()
        };
        encoder.check_against(&schema)?;

        info!(features = schema.len(), "Loaded frozen scaler parameters");
        Ok((schema, encoder))
    }

    /// Recorded metrics of this model, if they can be read
    ///
    /// A missing or malformed metadata document is not an error: the model
    /// is then treated as having no recorded metrics.
    pub fn load_metrics(&self) -> Option<MetricSet> {
        let path = self.config_path();
        if !path.is_file() {
            info!("No existing model config found - this is first retraining");
            return None;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<RecordedConfig>(&s).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => {
                info!(
                    version = config.version.as_deref().unwrap_or("unknown"),
                    accuracy = config.metrics.accuracy,
                    "Loaded current model metrics"
                );
                Some(config.metrics)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load current model metrics");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_name_pattern() {
        assert!(is_version_name("20261019_142233"));
        assert!(!is_version_name("20261019-142233"));
        assert!(!is_version_name(".staging-20261019_142233"));
        assert!(!is_version_name("latest"));
    }

    #[test]
    fn test_current_picks_newest_version() {
        let dir = tempfile::tempdir().unwrap();
        for v in ["20260101_000000", "20261019_120000", "20260505_235959"] {
            std::fs::create_dir(dir.path().join(v)).unwrap();
        }
        std::fs::create_dir(dir.path().join("not_a_version")).unwrap();

        let registry = ModelRegistry::open(dir.path());
        assert_eq!(registry.versions().unwrap().len(), 3);
        let current = registry.current().unwrap().unwrap();
        assert!(current.path().ends_with("20261019_120000"));
    }

    #[test]
    fn test_current_is_root_when_root_holds_a_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let current = ModelRegistry::open(dir.path()).current().unwrap().unwrap();
        assert_eq!(current.path(), dir.path());
    }

    #[test]
    fn test_newest_version_wins_over_root_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        std::fs::create_dir(dir.path().join("20261019_051619")).unwrap();

        let current = ModelRegistry::open(dir.path()).current().unwrap().unwrap();
        assert!(current.path().ends_with("20261019_051619"));
    }

    #[test]
    fn test_empty_or_missing_root_has_no_current() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelRegistry::open(dir.path()).current().unwrap().is_none());
        assert!(ModelRegistry::open(dir.path().join("missing")).current().unwrap().is_none());
    }

    #[test]
    fn test_metrics_tolerate_missing_and_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());
        assert!(model_dir.load_metrics().is_none());

        std::fs::write(model_dir.config_path(), "not json").unwrap();
        assert!(model_dir.load_metrics().is_none());

        std::fs::write(
            model_dir.config_path(),
            r#"{"version":"20260101_000000","metrics":{"accuracy":0.95,"precision":0.9,"recall":0.8,"f1":0.85,"auc":0.97}}"#,
        )
        .unwrap();
        assert_eq!(model_dir.load_metrics().unwrap().accuracy, 0.95);
    }

    #[test]
    fn test_load_model_missing_is_base_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelDir::new(dir.path()).load_model().unwrap_err();
        assert!(matches!(err, RetrainError::BaseModelMissing(p) if p.ends_with(MODEL_FILE)));
    }

    #[test]
    fn test_load_frozen_falls_back_to_encoder_columns() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());
        std::fs::write(
            model_dir.encoder_path(),
            r#"{"feature_columns":["amt","hour","travel"],"mean":[1.0,2.0,0.1],"std":[1.0,1.0,0.3]}"#,
        )
        .unwrap();

        let (schema, encoder) = model_dir.load_frozen().unwrap();
        assert_eq!(schema.columns(), &["amt", "hour", "travel"]);
        assert_eq!(encoder.mean, vec![1.0, 2.0, 0.1]);
    }

    #[test]
    fn test_load_frozen_rejects_schema_encoder_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = ModelDir::new(dir.path());
        std::fs::write(
            model_dir.encoder_path(),
            r#"{"feature_columns":["amt","hour"],"mean":[1.0,2.0],"std":[1.0,1.0]}"#,
        )
        .unwrap();
        std::fs::write(model_dir.schema_path(), r#"{"feature_columns":["hour","amt"]}"#).unwrap();

        assert!(matches!(model_dir.load_frozen(), Err(RetrainError::SchemaMissing(_))));
    }
}
