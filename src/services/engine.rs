//! Detection aggregation and pricing engine
//!
//! Exposes the three operations the HTTP layer calls:
//! - `detect` - image -> filtered, aggregated, priced items + annotated image
//! - `resolve_prices` - cart -> priced items
//! - `checkout` - cart -> receipt
//!
//! The engine holds no mutable state besides metrics counters; catalog and
//! detector are shared read-only, so concurrent requests need no coordination.

use crate::domain::{CartEntry, Catalog, ClassLabels, ConfidenceThreshold, PricedOrder, Receipt};
use crate::error::{EngineError, PricingError};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::detector::Detector;
use crate::io::imaging;
use crate::services::aggregator::aggregate;
use crate::services::checkout::ReceiptGenerator;
use crate::services::filter::filter_detections;
use crate::services::pricing::PricingResolver;
use crate::services::scaling::fit_within;
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Whether a scan found anything. An empty scan is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Recognized,
    NothingRecognized,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Recognized => "recognized",
            ScanStatus::NothingRecognized => "nothing_recognized",
        }
    }
}

/// Result of one `detect` call
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub status: ScanStatus,
    pub order: PricedOrder,
    /// JPEG data URI with candidate boxes drawn; only set when recognized
    pub annotated_image: Option<String>,
}

pub struct Engine {
    catalog: Arc<Catalog>,
    labels: ClassLabels,
    detector: Arc<dyn Detector>,
    threshold: ConfidenceThreshold,
    max_dimension: u32,
    receipts: ReceiptGenerator,
    metrics: Arc<Metrics>,
}

impl Engine {
    pub fn new(
        catalog: Arc<Catalog>,
        labels: ClassLabels,
        detector: Arc<dyn Detector>,
        threshold: ConfidenceThreshold,
        max_dimension: u32,
        receipts: ReceiptGenerator,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { catalog, labels, detector, threshold, max_dimension, receipts, metrics }
    }

    /// Wire an engine from configuration around an already-loaded detector
    pub fn from_config(config: &Config, detector: Arc<dyn Detector>, metrics: Arc<Metrics>) -> Self {
        let catalog = Arc::new(config.catalog().clone());
        let labels = match config.class_names() {
            Some(names) => ClassLabels::new(names.to_vec()),
            None => ClassLabels::from_catalog(&catalog),
        };
        let receipts =
            ReceiptGenerator::new(config.receipt_prefix(), config.receipt_collision_suffix());
        Self::new(
            catalog,
            labels,
            detector,
            config.confidence_threshold(),
            config.max_dimension(),
            receipts,
            metrics,
        )
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_loaded()
    }

    pub fn threshold(&self) -> ConfidenceThreshold {
        self.threshold
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Scale, detect, filter, aggregate, price and annotate one photo
    pub async fn detect(&self, image: RgbImage) -> Result<DetectionOutcome, EngineError> {
        let start = Instant::now();
        let result = self.run_detect(image).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok((outcome, candidates, kept)) => {
                self.metrics.record_scan(*candidates, *kept, outcome.order.total_count, latency_ms);
                info!(
                    status = %outcome.status.as_str(),
                    candidates = %candidates,
                    kept = %kept,
                    total_count = %outcome.order.total_count,
                    total_price = %outcome.order.total_price,
                    latency_ms = %latency_ms,
                    "detect_completed"
                );
            }
            Err(e) => {
                self.metrics.record_scan_failure();
                error!(error = %e, latency_ms = %latency_ms, "detect_failed");
            }
        }

        result.map(|(outcome, _, _)| outcome)
    }

    async fn run_detect(
        &self,
        image: RgbImage,
    ) -> Result<(DetectionOutcome, usize, usize), EngineError> {
        let max_dimension = self.max_dimension;
        let scaled =
            Arc::new(tokio::task::spawn_blocking(move || fit_within(image, max_dimension)).await?);

        let output = self.detector.detect(scaled.clone()).await?;

        let kept = filter_detections(&output.detections, self.threshold);
        let kept_count = kept.len();
        let aggregation = aggregate(kept, &self.labels);
        let order = PricingResolver::new(&self.catalog).price_aggregation(&aggregation)?;

        if aggregation.is_empty() {
            let outcome = DetectionOutcome {
                status: ScanStatus::NothingRecognized,
                order,
                annotated_image: None,
            };
            return Ok((outcome, output.detections.len(), 0));
        }

        // The visualization shows every candidate the model proposed
        let candidates = output.detections;
        let candidate_count = candidates.len();
        let annotated =
            tokio::task::spawn_blocking(move || imaging::annotate(&scaled, &candidates)).await??;

        let outcome = DetectionOutcome {
            status: ScanStatus::Recognized,
            order,
            annotated_image: Some(annotated),
        };
        Ok((outcome, candidate_count, kept_count))
    }

    /// Price a client cart against the catalog
    pub fn resolve_prices(&self, cart: &[CartEntry]) -> Result<PricedOrder, PricingError> {
        PricingResolver::new(&self.catalog).price_cart(cart)
    }

    /// Re-price the cart server-side and mint a receipt
    pub fn checkout(&self, cart: &[CartEntry]) -> Result<Receipt, PricingError> {
        let receipt = self.receipts.checkout(&self.catalog, cart)?;
        self.metrics.record_checkout(receipt.total_count, receipt.total_price);
        Ok(receipt)
    }
}
