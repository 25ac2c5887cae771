mod cli;

use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nordpool_price_cache::{init_metrics, AppConfig, PriceRepository};

use crate::cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nordpool_price_cache=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let metrics_handle = init_metrics()?;

    let config = AppConfig::load()?;
    let timezone = config.display.timezone().map_err(|e| anyhow!(e))?;
    info!(database = %config.database.path.display(), timezone = %timezone, "Configuration loaded");

    let repository = PriceRepository::open(&config.database).await?;
    let result = args.command.run(&repository, timezone).await;
    repository.close().await;

    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = std::fs::write(path, metrics_handle.render()) {
            error!(path = %path.display(), error = %e, "Failed to write metrics snapshot");
        }
    }

    result.context("command failed")
}
