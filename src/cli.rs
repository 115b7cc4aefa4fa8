//! CLI interface for fraud-retrain

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{self, RetrainConfig};
use crate::feedback::SqliteFeedbackRepository;
use crate::pipeline::Pipeline;
use crate::training::TrainStrategy;
use crate::types::RetrainOutcome;

#[derive(Parser)]
#[command(name = "fraud-retrain")]
#[command(about = "Retrain the fraud detection model from reviewer feedback and promote it only on improvement", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a config file (default: user config directory)
    #[arg(long, global = true, env = "FRAUD_RETRAIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model from scratch on all feedback
    Fresh {
        /// Feedback store (SQLite database)
        store: PathBuf,
        /// Directory that receives version directories
        output_dir: PathBuf,
        /// Currently deployed model (default: newest version in output_dir)
        current_model_dir: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Continue training the deployed model at a low learning rate
    FineTune {
        /// Feedback store (SQLite database)
        store: PathBuf,
        /// Directory that receives version directories
        output_dir: PathBuf,
        /// Currently deployed model, the starting point for fine-tuning
        current_model_dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show or initialize configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Skip the secondary runtime export
    #[arg(long)]
    no_export: bool,
    /// Override the split/initialization seed
    #[arg(long)]
    seed: Option<u64>,
}

/// Parse arguments, run, and return the process exit code
pub async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fresh {
            store,
            output_dir,
            current_model_dir,
            run,
        } => {
            let outcome = retrain(
                cli.config,
                TrainStrategy::FreshFit,
                store,
                output_dir,
                current_model_dir,
                run,
            )
            .await;
            Ok(report(&outcome))
        }
        Commands::FineTune {
            store,
            output_dir,
            current_model_dir,
            run,
        } => {
            let outcome = retrain(
                cli.config,
                TrainStrategy::FineTune,
                store,
                output_dir,
                Some(current_model_dir),
                run,
            )
            .await;
            Ok(report(&outcome))
        }
        Commands::Config { show, init } => {
            let path = match cli.config {
                Some(path) => path,
                None => config::config_path()?,
            };
            if init {
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    RetrainConfig::default().save_to(&path)?;
                    println!("Wrote default config to {}", path.display());
                }
            }
            if show || !init {
                let config = RetrainConfig::load_from(&path)?;
                println!("# {}", path.display());
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(0)
        }
    }
}

async fn retrain(
    config_path: Option<PathBuf>,
    strategy: TrainStrategy,
    store: PathBuf,
    output_dir: PathBuf,
    current_model_dir: Option<PathBuf>,
    args: RunArgs,
) -> RetrainOutcome {
    let loaded = match config_path {
        Some(path) => RetrainConfig::load_from(&path),
        None => RetrainConfig::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return RetrainOutcome::failure(format!("{:#}", e));
        }
    };

    if args.no_export {
        config.export.enabled = false;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }

    tracing::info!(
        strategy = ?strategy,
        store = %store.display(),
        output = %output_dir.display(),
        current = ?current_model_dir,
        "Starting fraud model retraining"
    );

    let mut pipeline = Pipeline::new(SqliteFeedbackRepository::new(&store), strategy, &output_dir, config);
    if let Some(dir) = current_model_dir {
        pipeline = pipeline.with_current_model_dir(dir);
    }
    pipeline.run().await
}

/// Print the human summary and the result line; returns the exit code
fn report(outcome: &RetrainOutcome) -> i32 {
    if outcome.success {
        if let (Some(version), Some(metrics)) = (&outcome.version, &outcome.metrics) {
            println!("Model Version: {}", version);
            println!("Accuracy:  {:.4}", metrics.accuracy);
            println!("Precision: {:.4}", metrics.precision);
            println!("Recall:    {:.4}", metrics.recall);
            println!("F1:        {:.4}", metrics.f1);
            println!("AUC:       {:.4}", metrics.auc);
        }
        if let Some(dir) = &outcome.output_dir {
            println!("Output: {}", dir);
        }
        println!("{}", outcome.to_result_line());
    } else {
        if let Some(error) = &outcome.error {
            eprintln!("ERROR: {}", error);
        }
        eprintln!("{}", outcome.to_result_line());
    }
    outcome.exit_code()
}
