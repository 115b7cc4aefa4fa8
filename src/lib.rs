//! Fraud Retrain - feedback-driven model retraining library
//!
//! Retrains the fraud classifier from reviewer-labeled transactions and
//! publishes the result only when it beats the deployed model:
//! - Labeled feedback extraction from the SQLite prediction store
//! - Feature alignment against a frozen schema and encoder
//! - Fresh-fit and fine-tune training strategies
//! - A single evaluation protocol and a strict promotion gate
//! - Atomic versioned publication with best-effort secondary export
//!
//! # Example
//!
//! ```ignore
//! use fraud_retrain::{Pipeline, RetrainConfig, SqliteFeedbackRepository, TrainStrategy};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = SqliteFeedbackRepository::new("data/predictions.db");
//!     let pipeline = Pipeline::new(source, TrainStrategy::FreshFit, "models", RetrainConfig::default());
//!     let outcome = pipeline.run().await;
//!     println!("{}", outcome.to_result_line());
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod feedback;
pub mod features;
pub mod model;
pub mod training;
pub mod evaluation;
pub mod promotion;
pub mod publish;
pub mod pipeline;
pub mod cli;

pub use config::RetrainConfig;
pub use error::RetrainError;
pub use feedback::{FeedbackSource, SqliteFeedbackRepository};
pub use features::{EncoderParams, FeatureAligner, FeatureSchema};
pub use pipeline::Pipeline;
pub use training::TrainStrategy;
pub use types::{FeedbackRecord, MetricSet, ModelKind, PromotionDecision, RetrainOutcome};
