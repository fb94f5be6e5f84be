//! Offline scan tool
//!
//! Runs one photo from disk through the same pipeline the HTTP service uses
//! and prints the JSON response. Handy for checking a threshold or a new set
//! of weights against a folder of tray photos.
//!
//! Usage:
//!   cargo run --bin bakery-scan -- tray.jpg --threshold 0.6 --annotated-out tray_boxes.jpg

use bakery_pos::domain::{CartEntry, ConfidenceThreshold};
use bakery_pos::infra::{Config, Metrics};
use bakery_pos::io::api::{CheckoutResponse, DetectionResponse};
use bakery_pos::io::{imaging, load_detector};
use bakery_pos::services::{Engine, ScanStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bakery-scan", about = "Recognize and price the breads in one photo")]
struct Args {
    /// Photo to scan
    image: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the acceptance threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the inference sidecar endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Write the annotated JPEG here when something is recognized
    #[arg(long)]
    annotated_out: Option<PathBuf>,

    /// Also check out the recognized items and print the receipt
    #[arg(long)]
    checkout: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays valid JSON
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));
    if let Some(value) = args.threshold {
        let threshold = ConfidenceThreshold::new(value)
            .ok_or_else(|| format!("--threshold must be within [0, 1], got {}", value))?;
        config = config.with_confidence_threshold(threshold);
    }
    if let Some(endpoint) = &args.endpoint {
        config = config.with_model_endpoint(endpoint);
    }

    let bytes = std::fs::read(&args.image)
        .map_err(|e| format!("failed to read {}: {}", args.image.display(), e))?;
    let image = imaging::decode_image(&bytes)?;

    let detector = load_detector(&config).await;
    let engine = Engine::from_config(&config, detector, Arc::new(Metrics::new()));
    if !engine.model_loaded() {
        eprintln!("warning: model weights not found, running without detections");
    }

    let outcome = engine.detect(image).await?;

    if let (Some(path), Some(uri)) = (&args.annotated_out, &outcome.annotated_image) {
        let encoded = uri.strip_prefix("data:image/jpeg;base64,").unwrap_or(uri);
        std::fs::write(path, STANDARD.decode(encoded)?)?;
        eprintln!("annotated image written to {}", path.display());
    }

    let cart: Vec<CartEntry> = outcome
        .order
        .items
        .iter()
        .map(|line| CartEntry::new(&line.class_key, line.count))
        .collect();
    let recognized = outcome.status == ScanStatus::Recognized;

    println!("{}", serde_json::to_string_pretty(&DetectionResponse::from(outcome))?);

    if args.checkout && recognized {
        let receipt = engine.checkout(&cart)?;
        println!("{}", serde_json::to_string_pretty(&CheckoutResponse::from(receipt))?);
    }

    Ok(())
}
