mod config;

use std::sync::Arc;

use anyhow::Context;
use config::{config_path, AppConfig, ConfigSource, PublisherKind};
use watchlist_engine::{
    BackoffRetrier, DirectoryPublisher, HarvestRunner, HttpRemoteFetcher, Publisher, S3Publisher,
    ScheduleLoop,
};
use watchlist_logging::{harvest_info, harvest_warn, parse_level, LogDestination};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let (config, source) = AppConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    watchlist_logging::initialize(
        LogDestination::from_optional_file(config.log_file.clone()),
        parse_level(&config.log_level),
    );
    match source {
        ConfigSource::File => harvest_info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => {
            harvest_info!("No configuration at {}; using defaults", path.display())
        }
    }

    let publisher = build_publisher(&config).await;
    let fetcher =
        HttpRemoteFetcher::new(config.fetch_settings()).context("building the HTTP client")?;
    let runner = HarvestRunner::new(
        Arc::new(fetcher),
        publisher,
        BackoffRetrier::new(config.backoff.policy()),
        config.runner_settings(),
        config.key_clock(),
    );

    let settings = config.schedule_settings();
    harvest_info!(
        "Harvesting every {}s with {} worker(s)",
        settings.interval.as_secs(),
        config.workers
    );
    let handle = ScheduleLoop::new(Arc::new(runner), settings).spawn();

    wait_for_shutdown_signal().await;
    harvest_info!("Stop requested; waiting for the current pass to finish");
    let passes = handle.shutdown().await.context("schedule loop panicked")?;
    harvest_info!("Harvester stopped after {passes} pass(es)");
    Ok(())
}

async fn build_publisher(config: &AppConfig) -> Arc<dyn Publisher> {
    match &config.publisher {
        PublisherKind::S3 => {
            harvest_info!(
                "Publishing to s3://{} in {}",
                config.bucket,
                config.region
            );
            Arc::new(S3Publisher::connect(config.bucket.clone(), config.region.clone()).await)
        }
        PublisherKind::Directory(dir) => {
            harvest_info!("Publishing to directory {}", dir.display());
            Arc::new(DirectoryPublisher::new(dir.clone()))
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            harvest_warn!("Cannot listen for SIGTERM: {err}");
            wait_for_ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        harvest_warn!("Cannot listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}
