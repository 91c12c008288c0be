mod cli;
mod summary;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use placematch_core::{
    fingerprint, load_config, load_config_from_env, load_entities, metrics,
    ExtractionOrchestrator, HttpExtractorFactory, ProgressStore, RunSettings,
};

use cli::Cli;
use summary::render_summary;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };
    cli.apply(&mut config);

    // Validate and resolve profile defaults
    let settings = RunSettings::from_config(&config).context("Configuration validation failed")?;
    info!(
        "Profile {:?}: {} workers, {:?}-{:?} delay, {:?} timeout, sample {}",
        config.orchestrator.profile,
        settings.workers,
        settings.pacing.min_delay,
        settings.pacing.max_delay,
        settings.pacing.extract_timeout,
        settings
            .plan
            .sample_size
            .map_or_else(|| "all".to_string(), |n| n.to_string())
    );

    // Load input entities
    let entities = load_entities(&config.paths.input)
        .await
        .with_context(|| format!("Failed to load entities from {:?}", config.paths.input))?;
    info!("Loaded {} entities from {:?}", entities.len(), config.paths.input);

    // Open progress
    let store = ProgressStore::open(
        &config.paths.progress,
        cli.start_mode(),
        Some(fingerprint(&entities)),
    )
    .await
    .with_context(|| format!("Failed to open checkpoint {:?}", config.paths.progress))?;

    let factory = HttpExtractorFactory::new(config.extractor.clone());
    info!("Using lookup service at {}", config.extractor.base_url);

    let orchestrator = ExtractionOrchestrator::new(settings, Arc::new(store), Arc::new(factory))
        .with_results_path(&config.paths.output);

    // Stop gracefully on Ctrl+C / SIGTERM
    let handle = orchestrator.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing in-flight tasks");
        handle.stop();
    });

    let result = orchestrator.run(&entities).await;
    signal_task.abort();
    let report = result.context("Extraction run failed")?;

    println!("{}", render_summary(&report, &config.paths.output));

    if let Some(path) = &cli.metrics_out {
        let text = metrics::render().context("Failed to encode metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!("Metrics written to {:?}", path);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
