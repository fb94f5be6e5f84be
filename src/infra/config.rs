//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::{Catalog, CatalogEntry, ConfidenceThreshold};
use crate::services::scaling::DEFAULT_MAX_DIMENSION;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins allowed to call the API
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Upload size cap (bytes)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Interval for the periodic metrics log line (0 disables it)
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string(), "http://localhost:3000".to_string()]
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Weights file; when missing the service runs without detections
    #[serde(default = "default_weights")]
    pub weights: String,
    /// Inference sidecar URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
    /// Candidate threshold the model itself runs with (kept permissive)
    #[serde(default = "default_candidate_confidence")]
    pub candidate_confidence: f64,
    #[serde(default = "default_iou")]
    pub iou: f64,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Test-time augmentation
    #[serde(default = "default_augment")]
    pub augment: bool,
    #[serde(default = "default_warm_up")]
    pub warm_up: bool,
    /// Class names in training order; defaults to catalog order
    #[serde(default)]
    pub class_names: Option<Vec<String>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            endpoint: default_endpoint(),
            timeout_ms: default_model_timeout_ms(),
            candidate_confidence: default_candidate_confidence(),
            iou: default_iou(),
            input_size: default_input_size(),
            augment: default_augment(),
            warm_up: default_warm_up(),
            class_names: None,
        }
    }
}

fn default_weights() -> String {
    "best.pt".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9000/predict".to_string()
}

fn default_model_timeout_ms() -> u64 {
    30_000
}

fn default_candidate_confidence() -> f64 {
    0.1
}

fn default_iou() -> f64 {
    0.45
}

fn default_input_size() -> u32 {
    640
}

fn default_augment() -> bool {
    true
}

fn default_warm_up() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Operating threshold applied after the model
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Longer-side cap before inference (pixels)
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_dimension: default_max_dimension(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.50
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default = "default_receipt_prefix")]
    pub prefix: String,
    /// Append a random suffix so same-second checkouts never share a number
    #[serde(default)]
    pub collision_suffix: bool,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self { prefix: default_receipt_prefix(), collision_suffix: false }
    }
}

fn default_receipt_prefix() -> String {
    "DDBB".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub receipt: ReceiptConfig,
    /// Replaces the built-in menu when non-empty
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    cors_origins: Vec<String>,
    max_body_bytes: usize,
    metrics_interval_secs: u64,
    model_weights: String,
    model_endpoint: String,
    model_timeout_ms: u64,
    candidate_confidence: f64,
    iou: f64,
    input_size: u32,
    augment: bool,
    warm_up: bool,
    class_names: Option<Vec<String>>,
    confidence_threshold: ConfidenceThreshold,
    max_dimension: u32,
    receipt_prefix: String,
    receipt_collision_suffix: bool,
    catalog: Catalog,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        let model = ModelConfig::default();
        let detection = DetectionConfig::default();
        let receipt = ReceiptConfig::default();
        Self {
            bind_address: server.bind_address,
            port: server.port,
            cors_origins: server.cors_origins,
            max_body_bytes: server.max_body_bytes,
            metrics_interval_secs: server.metrics_interval_secs,
            model_weights: model.weights,
            model_endpoint: model.endpoint,
            model_timeout_ms: model.timeout_ms,
            candidate_confidence: model.candidate_confidence,
            iou: model.iou,
            input_size: model.input_size,
            augment: model.augment,
            warm_up: model.warm_up,
            class_names: model.class_names,
            confidence_threshold: ConfidenceThreshold::default(),
            max_dimension: detection.max_dimension,
            receipt_prefix: receipt.prefix,
            receipt_collision_suffix: receipt.collision_suffix,
            catalog: Catalog::bakery_default(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(content).with_context(|| format!("Failed to parse config {}", source))?;

        let Some(confidence_threshold) =
            ConfidenceThreshold::new(toml_config.detection.confidence_threshold)
        else {
            bail!(
                "detection.confidence_threshold must be within [0, 1], got {}",
                toml_config.detection.confidence_threshold
            );
        };
        if !(0.0..=1.0).contains(&toml_config.model.candidate_confidence) {
            bail!(
                "model.candidate_confidence must be within [0, 1], got {}",
                toml_config.model.candidate_confidence
            );
        }
        if !(0.0..=1.0).contains(&toml_config.model.iou) {
            bail!("model.iou must be within [0, 1], got {}", toml_config.model.iou);
        }
        if toml_config.detection.max_dimension == 0 {
            bail!("detection.max_dimension must be positive");
        }

        let catalog = if toml_config.catalog.is_empty() {
            Catalog::bakery_default()
        } else {
            Catalog::new(toml_config.catalog)
                .with_context(|| format!("Invalid catalog in {}", source))?
        };

        Ok(Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            cors_origins: toml_config.server.cors_origins,
            max_body_bytes: toml_config.server.max_body_bytes,
            metrics_interval_secs: toml_config.server.metrics_interval_secs,
            model_weights: toml_config.model.weights,
            model_endpoint: toml_config.model.endpoint,
            model_timeout_ms: toml_config.model.timeout_ms,
            candidate_confidence: toml_config.model.candidate_confidence,
            iou: toml_config.model.iou,
            input_size: toml_config.model.input_size,
            augment: toml_config.model.augment,
            warm_up: toml_config.model.warm_up,
            class_names: toml_config.model.class_names,
            confidence_threshold,
            max_dimension: toml_config.detection.max_dimension,
            receipt_prefix: toml_config.receipt.prefix,
            receipt_collision_suffix: toml_config.receipt.collision_suffix,
            catalog,
            config_file: source.to_string(),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn model_weights(&self) -> &str {
        &self.model_weights
    }

    pub fn model_endpoint(&self) -> &str {
        &self.model_endpoint
    }

    pub fn model_timeout_ms(&self) -> u64 {
        self.model_timeout_ms
    }

    pub fn candidate_confidence(&self) -> f64 {
        self.candidate_confidence
    }

    pub fn iou(&self) -> f64 {
        self.iou
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn augment(&self) -> bool {
        self.augment
    }

    pub fn warm_up(&self) -> bool {
        self.warm_up
    }

    pub fn class_names(&self) -> Option<&[String]> {
        self.class_names.as_deref()
    }

    pub fn confidence_threshold(&self) -> ConfidenceThreshold {
        self.confidence_threshold
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn receipt_prefix(&self) -> &str {
        &self.receipt_prefix
    }

    pub fn receipt_collision_suffix(&self) -> bool {
        self.receipt_collision_suffix
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder for overriding the operating threshold (CLI, tests)
    pub fn with_confidence_threshold(mut self, threshold: ConfidenceThreshold) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Builder for pointing at a different weights file (CLI, tests)
    pub fn with_model_weights(mut self, weights: &str) -> Self {
        self.model_weights = weights.to_string();
        self
    }

    /// Builder for pointing at a different inference sidecar (CLI, tests)
    pub fn with_model_endpoint(mut self, endpoint: &str) -> Self {
        self.model_endpoint = endpoint.to_string();
        self
    }
}
