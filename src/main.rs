//! flurry: a batch outreach pipeline for business-registry CSV exports.
//!
//! Walks a cloud-storage folder tree of registry exports, filters rows by
//! geography, drops contacts already known to the relational store, and
//! pushes the survivors into the campaign service through a serial,
//! rate-limited queue.

mod campaign;
mod classify;
mod config;
mod db;
mod dispatch;
mod error;
mod filter;
mod metrics;
mod pipeline;
mod storage;

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{AddressParseSnafu, ConfigSnafu, MetricsSnafu, PipelineError};
use pipeline::run_pipeline;

/// Registry-export to campaign-service batch pipeline.
#[derive(Parser, Debug)]
#[command(name = "flurry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("flurry starting");

    // Load or build configuration
    let config = build_config(&args)?;

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.path);
        info!("Campaign service: {}", config.campaign.base_url);
        info!("Sequence steps: {}", config.campaign.template_ids.len());
        info!("Allowed cities: {}", config.filter.allowed_cities.len());
        info!("Retained columns: {}", config.filter.columns.len());
        info!("Classification concurrency: {}", config.classify.concurrency);
        info!(
            "Push delay: {}s, max attempts: {}",
            config.dispatch.push_delay_secs, config.dispatch.max_attempts
        );
        info!("Configuration is valid");
        return Ok(());
    }

    // Run the pipeline
    let stats = run_pipeline(config).await?;

    info!("Pipeline completed successfully");
    info!("  Folders processed: {}", stats.folders_processed);
    info!("  Folders skipped: {}", stats.folders_skipped);
    info!("  Files processed: {}", stats.files_processed);
    info!("  Files skipped: {}", stats.files_skipped);
    info!("  Rows filtered: {}", stats.rows_filtered);
    info!("  Rows surviving classification: {}", stats.rows_survived);
    info!("  Contacts pushed: {}", stats.contacts_pushed);
    info!("  Contacts skipped: {}", stats.contacts_skipped);
    info!("  Contacts failed: {}", stats.contacts_failed);

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    Config::from_file(&args.config).context(ConfigSnafu)
}
