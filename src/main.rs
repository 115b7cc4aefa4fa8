//! fraud-retrain - retrain and promote the fraud detection model

use fraud_retrain::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the summary and RESULT_JSON line
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let code = cli::run().await?;
    std::process::exit(code);
}
