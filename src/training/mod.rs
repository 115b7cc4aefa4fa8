//! Training strategies
//!
//! Fresh fit and fine-tune share one entry point and one split, so the
//! evaluation and promotion stages never need to know which one ran.

pub mod split;

pub use split::{stratified_split, Split};

use ndarray::{Array1, Array2};
use tracing::info;

use crate::config::TrainingConfig;
use crate::error::{Result, RetrainError};
use crate::evaluation::evaluate;
use crate::model::{DenseNetwork, FitOptions, TrainingOutput};
use crate::types::{MetricSet, ModelKind};

/// How a candidate model is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainStrategy {
    /// New network from scratch with class-balanced weighting
    FreshFit,
    /// Continue training an existing network at a low learning rate
    FineTune,
}

impl TrainStrategy {
    pub fn model_kind(&self) -> ModelKind {
        match self {
            TrainStrategy::FreshFit => ModelKind::Fresh,
            TrainStrategy::FineTune => ModelKind::FineTuned,
        }
    }

    pub fn requires_base_model(&self) -> bool {
        matches!(self, TrainStrategy::FineTune)
    }

    /// Produce a candidate from aligned features
    ///
    /// Fine-tuning fails with `BaseModelMissing` when `base_model` is absent;
    /// fresh fit ignores it.
    pub fn train(
        &self,
        x: &Array2<f32>,
        y: &Array1<f32>,
        base_model: Option<DenseNetwork>,
        config: &TrainingConfig,
        threshold: f64,
    ) -> Result<TrainedCandidate> {
        let split = stratified_split(x, y, config.test_fraction, config.seed)?;
        info!(
            strategy = ?self,
            training_samples = split.training_samples(),
            test_samples = split.test_samples(),
            "Prepared stratified split"
        );

        let (model, output, metrics_before) = match self {
            TrainStrategy::FreshFit => {
                let (model, output) = fresh_fit(&split, config)?;
                (model, output, None)
            }
            TrainStrategy::FineTune => {
                let mut model = base_model.ok_or_else(|| {
                    RetrainError::BaseModelMissing("<no base model supplied>".into())
                })?;

                let mut before = evaluate(&model, &split.x_test, &split.y_test, threshold)?;
                before.training_samples = split.training_samples();
                info!(accuracy = before.accuracy, auc = before.auc, "Evaluated base model before fine-tuning");

                let output = fine_tune(&mut model, &split, config)?;
                (model, output, Some(before))
            }
        };

        info!(
            epochs = output.epochs_completed,
            train_loss = output.final_train_loss,
            valid_loss = ?output.final_valid_loss,
            "Training complete"
        );

        Ok(TrainedCandidate {
            model,
            kind: self.model_kind(),
            split,
            output,
            metrics_before,
        })
    }
}

/// A trained, not yet evaluated, candidate model
#[derive(Debug, Clone)]
pub struct TrainedCandidate {
    pub model: DenseNetwork,
    pub kind: ModelKind,
    pub split: Split,
    pub output: TrainingOutput,
    /// Base model metrics on the same test split (fine-tune only)
    pub metrics_before: Option<MetricSet>,
}

impl TrainedCandidate {
    /// Evaluate the candidate on its held-out split
    pub fn evaluate(&self, threshold: f64) -> Result<MetricSet> {
        let mut metrics = evaluate(&self.model, &self.split.x_test, &self.split.y_test, threshold)?;
        metrics.training_samples = self.split.training_samples();
        metrics.test_samples = self.split.test_samples();
        Ok(metrics)
    }
}

fn fresh_fit(split: &Split, config: &TrainingConfig) -> Result<(DenseNetwork, TrainingOutput)> {
    let mut model = DenseNetwork::new(split.x_train.ncols(), config.hidden_units, config.seed);
    let options = FitOptions {
        learning_rate: config.fresh_learning_rate,
        epochs: config.fresh_epochs,
        batch_size: config.fresh_batch_size,
        seed: config.seed,
        validation_fraction: None,
        sample_weights: Some(balanced_weights(&split.y_train)),
    };
    let output = model.fit(&split.x_train, &split.y_train, &options)?;
    Ok((model, output))
}

fn fine_tune(model: &mut DenseNetwork, split: &Split, config: &TrainingConfig) -> Result<TrainingOutput> {
    info!(
        epochs = config.fine_tune_epochs,
        batch_size = config.fine_tune_batch_size,
        learning_rate = config.fine_tune_learning_rate,
        "Fine-tuning model"
    );
    let options = FitOptions {
        learning_rate: config.fine_tune_learning_rate,
        epochs: config.fine_tune_epochs,
        batch_size: config.fine_tune_batch_size,
        seed: config.seed,
        validation_fraction: Some(config.validation_fraction),
        sample_weights: None,
    };
    model.fit(&split.x_train, &split.y_train, &options)
}

/// Weight each sample by `n / (2 * n_class)` so both classes count equally
pub fn balanced_weights(y: &Array1<f32>) -> Array1<f32> {
    let n = y.len() as f32;
    let positives = y.iter().filter(|&&v| v > 0.5).count() as f32;
    let negatives = n - positives;

    let weight = |count: f32| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
    let (w_pos, w_neg) = (weight(positives), weight(negatives));

    y.mapv(|v| if v > 0.5 { w_pos } else { w_neg })
}
