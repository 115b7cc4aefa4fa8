//! Dense binary classifier
//!
//! One ReLU hidden layer and a single logit output, defined as a burn
//! module on the ndarray backend and trained with Adam on (optionally
//! class-weighted) binary cross-entropy.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Param};
use burn::nn::{Linear, Relu};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::Classifier;
use crate::error::{Result, RetrainError};

/// Backend used while training
pub type TrainBackend = Autodiff<NdArray>;
type InferBackend = NdArray;

/// Tag written into the model blob and metadata
pub const MODEL_TYPE: &str = "DenseNetwork";

const PROB_EPSILON: f32 = 1e-7;

/// Options for one call to [`DenseNetwork::fit`]
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seed for batch shuffling
    pub seed: u64,
    /// Fraction of rows, taken from the tail, held out to monitor loss
    pub validation_fraction: Option<f64>,
    /// Per-sample loss weights, usually class-balancing
    pub sample_weights: Option<Array1<f32>>,
}

/// Output from training
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutput {
    /// Final training loss
    pub final_train_loss: f32,
    /// Final validation loss (if validation data was used)
    pub final_valid_loss: Option<f32>,
    /// Number of epochs completed
    pub epochs_completed: usize,
}

/// Feedforward fraud scorer: `[batch, features]` in, `[batch, 1]` logits out
#[derive(Module, Debug)]
pub struct FraudNet<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> FraudNet<B> {
    fn from_blob(blob: &ModelBlob, device: &B::Device) -> Self {
        let linear = |weight: &[f32], rows: usize, cols: usize, bias: &[f32]| Linear {
            weight: Param::from_tensor(
                Tensor::<B, 1>::from_floats(weight, device).reshape([rows, cols]),
            ),
            bias: Some(Param::from_tensor(Tensor::<B, 1>::from_floats(bias, device))),
        };

        Self {
            hidden: linear(
                &blob.hidden_weight,
                blob.input_dim,
                blob.hidden_units,
                &blob.hidden_bias,
            ),
            output: linear(&blob.output_weight, blob.hidden_units, 1, &[blob.output_bias]),
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(input);
        let x = self.activation.forward(x);
        self.output.forward(x)
    }
}

/// On-disk form of the network: architecture plus row-major weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelBlob {
    model_type: String,
    input_dim: usize,
    hidden_units: usize,
    hidden_weight: Vec<f32>,
    hidden_bias: Vec<f32>,
    output_weight: Vec<f32>,
    output_bias: f32,
}

impl ModelBlob {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.model_type != MODEL_TYPE {
            return Err(format!("unsupported model type '{}'", self.model_type));
        }
        if self.input_dim == 0
            || self.hidden_units == 0
            || self.hidden_weight.len() != self.input_dim * self.hidden_units
            || self.hidden_bias.len() != self.hidden_units
            || self.output_weight.len() != self.hidden_units
        {
            return Err("inconsistent layer shapes".to_string());
        }
        Ok(())
    }
}

/// The trainable classifier
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    net: FraudNet<TrainBackend>,
    input_dim: usize,
    hidden_units: usize,
    device: NdArrayDevice,
}

impl DenseNetwork {
    /// Create a network with seeded Glorot-uniform weights and zero biases
    pub fn new(input_dim: usize, hidden_units: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let input_dim = input_dim.max(1);
        let hidden_units = hidden_units.max(1);

        let limit1 = (6.0 / (input_dim + hidden_units) as f32).sqrt();
        let limit2 = (6.0 / (hidden_units + 1) as f32).sqrt();

        let blob = ModelBlob {
            model_type: MODEL_TYPE.to_string(),
            input_dim,
            hidden_units,
            hidden_weight: (0..input_dim * hidden_units)
                .map(|_| rng.random_range(-limit1..limit1))
                .collect(),
            hidden_bias: vec![0.0; hidden_units],
            output_weight: (0..hidden_units)
                .map(|_| rng.random_range(-limit2..limit2))
                .collect(),
            output_bias: 0.0,
        };
        Self::from_blob(&blob)
    }

    fn from_blob(blob: &ModelBlob) -> Self {
        let device = NdArrayDevice::default();
        Self {
            net: FraudNet::from_blob(blob, &device),
            input_dim: blob.input_dim,
            hidden_units: blob.hidden_units,
            device,
        }
    }

    fn to_blob(&self) -> Result<ModelBlob> {
        let bias = |linear: &Linear<TrainBackend>| -> Result<Vec<f32>> {
            match &linear.bias {
                Some(b) => values(b.val()),
                None => Ok(Vec::new()),
            }
        };

        Ok(ModelBlob {
            model_type: MODEL_TYPE.to_string(),
            input_dim: self.input_dim,
            hidden_units: self.hidden_units,
            hidden_weight: values(self.net.hidden.weight.val())?,
            hidden_bias: bias(&self.net.hidden)?,
            output_weight: values(self.net.output.weight.val())?,
            output_bias: bias(&self.net.output)?.first().copied().unwrap_or(0.0),
        })
    }

    pub fn model_type(&self) -> &'static str {
        MODEL_TYPE
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let blob: ModelBlob = serde_json::from_str(&contents)?;
        blob.validate().map_err(|reason| {
            RetrainError::TrainingFailure(format!("model blob {}: {}", path.display(), reason))
        })?;
        Ok(Self::from_blob(&blob))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(&self.to_blob()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn check_input(&self, x: &Array2<f32>) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(RetrainError::TrainingFailure(format!(
                "model expects {} features, got {}",
                self.input_dim,
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Mean unweighted BCE over a dataset
    pub fn loss(&self, x: &Array2<f32>, y: &Array1<f32>) -> Result<f32> {
        let p = self.predict_proba(x)?;
        Ok(mean_bce(&p, y))
    }

    /// Train in place, continuing from the current weights
    ///
    /// Adam state always starts fresh.
    pub fn fit(&mut self, x: &Array2<f32>, y: &Array1<f32>, options: &FitOptions) -> Result<TrainingOutput> {
        self.check_input(x)?;
        if x.nrows() == 0 {
            return Err(RetrainError::TrainingFailure("No training data provided".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(RetrainError::TrainingFailure(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let weights = match &options.sample_weights {
            Some(w) if w.len() == y.len() => w.clone(),
            Some(w) => {
                return Err(RetrainError::TrainingFailure(format!(
                    "{} sample weights for {} rows",
                    w.len(),
                    y.len()
                )))
            }
            None => Array1::ones(y.len()),
        };

        let n = x.nrows();
        let n_valid = options
            .validation_fraction
            .map(|f| ((n as f64) * f.clamp(0.0, 0.5)).floor() as usize)
            .unwrap_or(0)
            .min(n.saturating_sub(1));
        let n_train = n - n_valid;

        let valid_idx: Vec<usize> = (n_train..n).collect();
        let (x_valid, y_valid) = (x.select(Axis(0), &valid_idx), y.select(Axis(0), &valid_idx));

        let batch_size = options.batch_size.max(1);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut optimizer = AdamConfig::new().init();
        let mut order: Vec<usize> = (0..n_train).collect();
        let mut output = TrainingOutput {
            final_train_loss: 0.0,
            final_valid_loss: None,
            epochs_completed: 0,
        };

        info!(
            samples = n_train,
            validation = n_valid,
            epochs = options.epochs,
            batch_size,
            learning_rate = options.learning_rate,
            "Starting training"
        );

        for epoch in 0..options.epochs {
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0f64;
            let mut batch_count = 0usize;
            for chunk in order.chunks(batch_size) {
                let inputs = matrix::<TrainBackend>(&x.select(Axis(0), chunk), &self.device);
                let targets = vector::<TrainBackend>(&y.select(Axis(0), chunk), &self.device);
                let sample_weights = vector::<TrainBackend>(&weights.select(Axis(0), chunk), &self.device);

                let logits: Tensor<TrainBackend, 1> = self.net.forward(inputs).reshape([chunk.len()]);
                let loss = weighted_bce(logits, targets, sample_weights);

                let loss_value = values(loss.clone())?.first().copied().unwrap_or(f32::NAN);
                if !loss_value.is_finite() {
                    return Err(RetrainError::TrainingFailure(format!(
                        "non-finite loss at epoch {}",
                        epoch + 1
                    )));
                }
                epoch_loss += f64::from(loss_value);
                batch_count += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.net);
                self.net = optimizer.step(options.learning_rate, self.net.clone(), grads);
            }

            output.final_train_loss = if batch_count > 0 {
                (epoch_loss / batch_count as f64) as f32
            } else {
                0.0
            };
            output.final_valid_loss = if n_valid > 0 {
                Some(self.loss(&x_valid, &y_valid)?)
            } else {
                None
            };
            output.epochs_completed = epoch + 1;

            debug!(
                epoch = epoch + 1,
                train_loss = output.final_train_loss,
                valid_loss = ?output.final_valid_loss,
                "Epoch complete"
            );
        }

        Ok(output)
    }
}

/// Networks are equal when their weights are
impl PartialEq for DenseNetwork {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_blob(), other.to_blob()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Classifier for DenseNetwork {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>> {
        self.check_input(x)?;
        if x.nrows() == 0 {
            return Ok(Array1::zeros(0));
        }

        let model: FraudNet<InferBackend> = self.net.valid();
        let logits = model.forward(matrix::<InferBackend>(x, &self.device));
        let p: Tensor<InferBackend, 1> = activation::sigmoid(logits).reshape([x.nrows()]);
        Ok(Array1::from(values(p)?))
    }
}

/// Class-weighted binary cross-entropy on logits
///
/// Uses `softplus(z) - y * z`, which stays finite for large `|z|`.
fn weighted_bce<B: Backend>(logits: Tensor<B, 1>, targets: Tensor<B, 1>, weights: Tensor<B, 1>) -> Tensor<B, 1> {
    let softplus = activation::relu(logits.clone()) + logits.clone().abs().neg().exp().log1p();
    let per_sample = softplus - logits * targets;
    (per_sample * weights.clone()).sum() / weights.sum().clamp_min(f32::EPSILON)
}

fn matrix<B: Backend>(x: &Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let data: Vec<f32> = x.iter().copied().collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([x.nrows(), x.ncols()])
}

fn vector<B: Backend>(v: &Array1<f32>, device: &B::Device) -> Tensor<B, 1> {
    let data: Vec<f32> = v.iter().copied().collect();
    Tensor::<B, 1>::from_floats(data.as_slice(), device)
}

fn values<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| RetrainError::TrainingFailure(format!("cannot read tensor data: {:?}", e)))
}

fn bce(p: f32, y: f32) -> f32 {
    let p = p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Mean binary cross-entropy of probabilities against 0/1 labels
pub fn mean_bce(p: &Array1<f32>, y: &Array1<f32>) -> f32 {
    if p.is_empty() {
        return 0.0;
    }
    let total = ndarray::Zip::from(p)
        .and(y)
        .fold(0.0f32, |acc, &p, &y| acc + bce(p, y));
    total / p.len() as f32
}
