//! Bakery POS - bread recognition and checkout service
//!
//! Module structure:
//! - `domain/` - Core types (detections, catalog, orders, receipts)
//! - `services/` - Filter, aggregation, pricing, checkout, engine
//! - `io/` - Detector backends, imaging, HTTP API
//! - `infra/` - Config, metrics

use bakery_pos::domain::ConfidenceThreshold;
use bakery_pos::infra::{Config, Metrics};
use bakery_pos::io::{http, load_detector};
use bakery_pos::services::Engine;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Bakery POS - photo-based bread recognition and checkout
#[derive(Parser, Debug)]
#[command(name = "bakery-pos", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the acceptance threshold from the config file
    #[arg(long)]
    threshold: Option<f64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Default: INFO, use RUST_LOG=debug for per-request detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = %env!("CARGO_PKG_VERSION"), build = %env!("GIT_HASH"), "bakery-pos starting");

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let mut config = Config::load_from_path(&config_path);
    if let Some(value) = args.threshold {
        let threshold = ConfidenceThreshold::new(value)
            .ok_or_else(|| format!("--threshold must be within [0, 1], got {}", value))?;
        config = config.with_confidence_threshold(threshold);
    }

    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        model_weights = %config.model_weights(),
        model_endpoint = %config.model_endpoint(),
        confidence_threshold = %config.confidence_threshold(),
        max_dimension = %config.max_dimension(),
        catalog_size = %config.catalog().len(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let detector = load_detector(&config).await;
    let engine = Arc::new(Engine::from_config(&config, detector, metrics.clone()));
    info!(model_loaded = %engine.model_loaded(), "engine_ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let reporter_metrics = metrics.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                reporter_metrics.snapshot().log();
            }
        });
    }

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = http::start_server(&config, engine, shutdown_rx).await {
        error!(error = %e, "http_server_error");
        return Err(e.into());
    }

    metrics.snapshot().log();
    info!("bakery-pos shutdown complete");
    Ok(())
}
