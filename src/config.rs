//! Configuration management
//!
//! Training hyperparameters, the evaluation threshold and the secondary
//! export command, loaded from TOML with per-field defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrainConfig {
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Hyperparameters for both training strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed shared by the split, weight init and batch shuffling
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Hidden units of a freshly created network
    #[serde(default = "default_hidden_units")]
    pub hidden_units: usize,
    #[serde(default = "default_fresh_learning_rate")]
    pub fresh_learning_rate: f64,
    #[serde(default = "default_fresh_epochs")]
    pub fresh_epochs: usize,
    #[serde(default = "default_fresh_batch_size")]
    pub fresh_batch_size: usize,
    /// Kept small so fine-tuning does not erase prior knowledge
    #[serde(default = "default_fine_tune_learning_rate")]
    pub fine_tune_learning_rate: f64,
    #[serde(default = "default_fine_tune_epochs")]
    pub fine_tune_epochs: usize,
    #[serde(default = "default_fine_tune_batch_size")]
    pub fine_tune_batch_size: usize,
    /// Tail of the training partition used to monitor fine-tune loss
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,
}

fn default_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_hidden_units() -> usize {
    16
}

fn default_fresh_learning_rate() -> f64 {
    1e-2
}

fn default_fresh_epochs() -> usize {
    60
}

fn default_fresh_batch_size() -> usize {
    32
}

fn default_fine_tune_learning_rate() -> f64 {
    1e-4
}

fn default_fine_tune_epochs() -> usize {
    10
}

fn default_fine_tune_batch_size() -> usize {
    4
}

fn default_validation_fraction() -> f64 {
    0.2
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            hidden_units: default_hidden_units(),
            fresh_learning_rate: default_fresh_learning_rate(),
            fresh_epochs: default_fresh_epochs(),
            fresh_batch_size: default_fresh_batch_size(),
            fine_tune_learning_rate: default_fine_tune_learning_rate(),
            fine_tune_epochs: default_fine_tune_epochs(),
            fine_tune_batch_size: default_fine_tune_batch_size(),
            validation_fraction: default_validation_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Probability above which a transaction is predicted as fraud
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Secondary runtime export
///
/// Runs `<program> <args...>`. Arguments may reference `{model}` (the
/// published model blob) and `{out_dir}` (the version's `web_model`
/// directory); when neither appears, both are appended in that order. The
/// converter must accept the JSON weights blob, so export stays off until an
/// operator configures one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_export_timeout")]
    pub timeout_secs: u64,
}

fn default_export_timeout() -> u64 {
    120
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: String::new(),
            args: Vec::new(),
            timeout_secs: default_export_timeout(),
        }
    }
}

impl RetrainConfig {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load from an explicit path, falling back to defaults when absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RetrainConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Write this configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "fraud-retrain", "fraud-retrain")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}
