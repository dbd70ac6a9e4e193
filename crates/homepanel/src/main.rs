use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use homepanel::config::LoggingConfig;
use homepanel::Config;
use homepanel::Dashboard;
use homepanel::Event;
use homepanel::HttpDeviceApi;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Headless home dashboard: mirrors the home service and serves the panel API
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `service.base_url`
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::builtin(),
    };
    if let Some(base_url) = args.base_url {
        config.service.base_url = base_url;
        config.validate()?;
    }

    init_logging(&config.logging);

    tracing::info!("homepanel starting");
    match &args.config {
        Some(path) => tracing::info!("Loaded config from: {}", path.display()),
        None => tracing::info!("No config file given, using defaults"),
    }

    let client = HttpDeviceApi::new(&config.service, &config.camera)
        .context("Failed to create service client")?;
    let dashboard = Dashboard::mount(&config, Arc::new(client));

    let mut events = dashboard.subscribe();
    let alerts = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::IntrusionDetected { distance }) => {
                    tracing::warn!("ALERT: intruder detected at {} cm", distance);
                }
                Ok(Event::CameraActivationRequested) => {
                    tracing::info!("Camera view activated");
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Alert listener lagged, {} events dropped", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server = tokio::spawn(homepanel::api::serve(
        config.api.listen.clone(),
        config.api.port,
        dashboard.handle(),
        shutdown_rx,
    ));

    tracing::info!("Press Ctrl+C to exit");

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
            None
        }
        result = &mut server => Some(result),
    };

    let server_result = match finished {
        Some(result) => result,
        None => {
            shutdown_tx.send(()).ok();
            server.await
        }
    };

    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Panel API error: {:#}", e),
        Err(e) => tracing::error!("Panel API task failed: {}", e),
    }

    dashboard.unmount().await;
    alerts.abort();

    tracing::info!("homepanel shutdown complete");

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = Targets::new()
        .with_default(LevelFilter::from(logging.level))
        .with_targets(
            logging
                .overrides
                .iter()
                .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
