//! Retrain-and-promote pipeline
//!
//! Phase one (train, evaluate, decide, publish) is the source of truth and
//! writes nothing unless the candidate is accepted. Phase two (secondary
//! export) is best-effort and only ever adds to a published version.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::RetrainConfig;
use crate::error::{Result, RetrainError};
use crate::feedback::{class_counts, FeedbackSource};
use crate::features::{EncoderParams, FeatureAligner, FeatureSchema};
use crate::promotion::decide;
use crate::publish::{
    ArtifactPublisher, Exporter, ModelDir, ModelRegistry, PublishRequest, PublishedVersion, MODEL_FILE,
};
use crate::training::TrainStrategy;
use crate::types::{FeedbackRecord, MetricSet, ModelKind, PromotionDecision, RetrainOutcome};

/// What phase one produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub kind: ModelKind,
    pub metrics: MetricSet,
    /// Base model on the same test split, fine-tune only
    pub metrics_before: Option<MetricSet>,
    pub decision: PromotionDecision,
    /// Present only when the candidate was accepted
    pub published: Option<PublishedVersion>,
}

/// One retraining run against one destination
pub struct Pipeline<S: FeedbackSource> {
    source: S,
    strategy: TrainStrategy,
    output_dir: PathBuf,
    current_model_dir: Option<PathBuf>,
    config: RetrainConfig,
}

impl<S: FeedbackSource> Pipeline<S> {
    pub fn new<P: AsRef<Path>>(source: S, strategy: TrainStrategy, output_dir: P, config: RetrainConfig) -> Self {
        Self {
            source,
            strategy,
            output_dir: output_dir.as_ref().to_path_buf(),
            current_model_dir: None,
            config,
        }
    }

    /// Compare against, and for fine-tuning start from, the model in `dir`
    ///
    /// Without it, the newest version under the output directory is used.
    pub fn with_current_model_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_model_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn current_model(&self) -> Result<Option<ModelDir>> {
        match &self.current_model_dir {
            Some(dir) => Ok(ModelRegistry::open(dir)
                .current()?
                .or_else(|| Some(ModelDir::new(dir)))),
            None => ModelRegistry::open(&self.output_dir).current(),
        }
    }

    /// Train, evaluate, decide and, only if accepted, publish
    pub fn train_and_publish(&self) -> Result<RunReport> {
        let current = self.current_model()?;
        if let Some(dir) = &current {
            info!(path = %dir.path().display(), "Current model");
        }

        // Fine-tuning must fail before any data is read
        if self.strategy.requires_base_model() {
            match &current {
                Some(dir) if dir.has_model() => {}
                Some(dir) => return Err(RetrainError::BaseModelMissing(dir.model_path())),
                None => return Err(RetrainError::BaseModelMissing(self.output_dir.join(MODEL_FILE))),
            }
        }

        let current_metrics = current.as_ref().and_then(ModelDir::load_metrics);

        let records = self.source.fetch()?;
        let (fraud, legitimate) = class_counts(&records);
        info!(total = records.len(), fraud, legitimate, "Class distribution");

        let (schema, frozen) = self.resolve_schema(current.as_ref(), &records)?;
        let aligned = FeatureAligner::new(&schema).align(&records, frozen.as_ref())?;
        info!(rows = aligned.matrix.nrows(), features = aligned.matrix.ncols(), "Features aligned");

        let base_model = match (&current, self.strategy) {
            (Some(dir), TrainStrategy::FineTune) => Some(dir.load_model()?),
            _ => None,
        };

        let threshold = self.config.evaluation.threshold;
        let candidate = self.strategy.train(
            &aligned.matrix,
            &aligned.labels,
            base_model,
            &self.config.training,
            threshold,
        )?;
        let metrics = candidate.evaluate(threshold)?;
        log_metrics("Evaluated candidate", &metrics);

        let decision = decide(current_metrics.as_ref(), &metrics);
        if !decision.accepted {
            return Ok(RunReport {
                kind: candidate.kind,
                metrics,
                metrics_before: candidate.metrics_before,
                decision,
                published: None,
            });
        }

        let publisher = ArtifactPublisher::new(&self.output_dir, threshold);
        let published = publisher.publish(&PublishRequest {
            model: &candidate.model,
            metrics: &metrics,
            schema: &schema,
            encoder: &aligned.encoder,
            kind: candidate.kind,
            is_baseline: current_metrics.is_none(),
        })?;

        Ok(RunReport {
            kind: candidate.kind,
            metrics,
            metrics_before: candidate.metrics_before,
            decision,
            published: Some(published),
        })
    }

    /// Frozen schema and encoder from the current model, or a fresh baseline
    fn resolve_schema(
        &self,
        current: Option<&ModelDir>,
        records: &[FeedbackRecord],
    ) -> Result<(FeatureSchema, Option<EncoderParams>)> {
        match current {
            Some(dir) if dir.has_encoder() => {
                let (schema, encoder) = dir.load_frozen()?;
                Ok((schema, Some(encoder)))
            }
            Some(dir) if self.strategy.requires_base_model() => Err(RetrainError::SchemaMissing(format!(
                "scaler parameters not found at {}",
                dir.encoder_path().display()
            ))),
            None if self.strategy.requires_base_model() => Err(RetrainError::SchemaMissing(
                "no current model to take a frozen schema from".to_string(),
            )),
            _ => {
                let schema = FeatureSchema::from_records(records);
                info!(features = schema.len(), "No frozen encoder, deriving baseline schema from feedback");
                Ok((schema, None))
            }
        }
    }

    /// Run both phases and fold the result into a [`RetrainOutcome`]
    pub async fn run(&self) -> RetrainOutcome {
        let report = match self.train_and_publish() {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Retraining failed");
                return RetrainOutcome::failure(e.to_string());
            }
        };

        let Some(published) = &report.published else {
            let current = report.decision.current_accuracy.unwrap_or_default();
            let rejection = RetrainError::NotBetterThanCurrent {
                current,
                new: report.decision.new_accuracy,
            };
            warn!(error = %rejection, "Aborting - keeping current model");
            return RetrainOutcome {
                success: false,
                model_kind: Some(report.kind),
                metrics: Some(report.metrics),
                metrics_before: report.metrics_before,
                current_accuracy: report.decision.current_accuracy,
                new_accuracy: Some(report.decision.new_accuracy),
                improvement: report.decision.improvement,
                error: Some(rejection.to_string()),
                ..Default::default()
            };
        };

        let exporter = Exporter::new(self.config.export.clone());
        let export = if exporter.is_enabled() {
            Some(
                exporter
                    .export_report(&published.model_path(), &published.export_dir())
                    .await,
            )
        } else {
            info!("Secondary export disabled");
            None
        };

        info!(
            version = %published.version,
            accuracy = report.metrics.accuracy,
            output = %published.dir.display(),
            "Retraining complete"
        );

        RetrainOutcome {
            success: true,
            version: Some(published.version.clone()),
            model_kind: Some(report.kind),
            metrics: Some(report.metrics.clone()),
            metrics_before: report.metrics_before.clone(),
            output_dir: Some(published.dir.display().to_string()),
            improvement: report.decision.improvement,
            current_accuracy: report.decision.current_accuracy,
            new_accuracy: Some(report.decision.new_accuracy),
            export,
            error: None,
        }
    }
}

fn log_metrics(label: &str, m: &MetricSet) {
    info!(
        accuracy = m.accuracy,
        precision = m.precision,
        recall = m.recall,
        f1 = m.f1,
        auc = m.auc,
        loss = m.loss,
        training_samples = m.training_samples,
        test_samples = m.test_samples,
        "{}",
        label
    );
}
