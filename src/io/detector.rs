//! Object-detection model capability
//!
//! The engine only sees the `Detector` trait: image in, raw detections out.
//! Backends:
//! - `UnavailableDetector` - degraded mode when the weights file is missing
//! - `SidecarDetector` - forwards images to an inference sidecar that hosts
//!   the weights, over HTTP
//!
//! Inference is never retried here; a failed call fails the whole scan.

use crate::domain::{BoundingBox, RawDetection};
use crate::error::EngineError;
use crate::infra::config::Config;
use crate::io::imaging;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the model reported for one image, before the operating threshold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutput {
    pub detections: Vec<RawDetection>,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Run the model on an already-scaled image. Geometry in the result is in
    /// that image's coordinate space.
    async fn detect(&self, image: Arc<RgbImage>) -> Result<ModelOutput, EngineError>;

    /// False when running in degraded mode
    fn is_loaded(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Degraded mode: no weights, so nothing is ever detected
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDetector;

#[async_trait]
impl Detector for UnavailableDetector {
    async fn detect(&self, _image: Arc<RgbImage>) -> Result<ModelOutput, EngineError> {
        Ok(ModelOutput::default())
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Request body understood by the inference sidecar
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub weights: String,
    /// Base64 JPEG
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub conf: f64,
    pub iou: f64,
    pub imgsz: u32,
    pub augment: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictedBox {
    pub class_id: u32,
    pub confidence: f64,
    /// [x1, y1, x2, y2] in request image pixels
    #[serde(rename = "box")]
    pub xyxy: [f32; 4],
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub detections: Vec<PredictedBox>,
}

/// Rejects confidences outside [0, 1] so a misbehaving host cannot leak
/// them into aggregation
impl TryFrom<PredictedBox> for RawDetection {
    type Error = EngineError;

    fn try_from(b: PredictedBox) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&b.confidence) {
            return Err(EngineError::Inference(format!(
                "sidecar returned confidence {} for class {}",
                b.confidence, b.class_id
            )));
        }
        let [x1, y1, x2, y2] = b.xyxy;
        Ok(RawDetection::new(b.class_id, b.confidence, BoundingBox::new(x1, y1, x2, y2)))
    }
}

/// Parameters forwarded with every inference call
#[derive(Debug, Clone)]
pub struct SidecarParams {
    pub weights: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub candidate_confidence: f64,
    pub iou: f64,
    pub input_size: u32,
    pub augment: bool,
}

impl SidecarParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weights: config.model_weights().to_string(),
            endpoint: config.model_endpoint().to_string(),
            timeout: Duration::from_millis(config.model_timeout_ms()),
            candidate_confidence: config.candidate_confidence(),
            iou: config.iou(),
            input_size: config.input_size(),
            augment: config.augment(),
        }
    }
}

/// Inference over HTTP to a sidecar that hosts the weights
pub struct SidecarDetector {
    params: SidecarParams,
    client: reqwest::Client,
}

impl SidecarDetector {
    pub fn new(params: SidecarParams) -> Result<Self, EngineError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()
            .map_err(|e| EngineError::Inference(format!("http client: {}", e)))?;
        Ok(Self { params, client })
    }

    /// Push one blank frame through the model so the first real scan is not slow
    pub async fn warm_up(&self) {
        let size = self.params.input_size;
        let start = Instant::now();
        match self.detect(Arc::new(RgbImage::new(size, size))).await {
            Ok(_) => info!(latency_ms = %start.elapsed().as_millis(), "model_warm_up_complete"),
            Err(e) => warn!(error = %e, "model_warm_up_failed"),
        }
    }

    async fn build_request(&self, image: Arc<RgbImage>) -> Result<PredictRequest, EngineError> {
        let (width, height) = image.dimensions();
        let jpeg = tokio::task::spawn_blocking(move || imaging::encode_jpeg(&image))
            .await?
            .map_err(EngineError::Encode)?;

        Ok(PredictRequest {
            weights: self.params.weights.clone(),
            image: STANDARD.encode(jpeg),
            width,
            height,
            conf: self.params.candidate_confidence,
            iou: self.params.iou,
            imgsz: self.params.input_size,
            augment: self.params.augment,
        })
    }
}

#[async_trait]
impl Detector for SidecarDetector {
    async fn detect(&self, image: Arc<RgbImage>) -> Result<ModelOutput, EngineError> {
        let start = Instant::now();
        let request = self.build_request(image).await?;
        let body = serde_json::to_vec(&request)
            .map_err(|e| EngineError::Inference(format!("request encoding: {}", e)))?;

        let response = self
            .client
            .post(&self.params.endpoint)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::Inference(format!("sidecar unreachable: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Inference(format!("sidecar response: {}", e)))?;
        if !status.is_success() {
            return Err(EngineError::Inference(format!(
                "sidecar returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes)
            )));
        }

        let parsed: PredictResponse = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Inference(format!("malformed sidecar response: {}", e)))?;

        let detections = parsed
            .detections
            .into_iter()
            .map(RawDetection::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            candidates = %detections.len(),
            latency_ms = %start.elapsed().as_millis(),
            "sidecar_inference"
        );
        Ok(ModelOutput { detections })
    }

    fn name(&self) -> &str {
        "sidecar"
    }
}

/// Pick a backend. A missing weights file is not fatal: the service starts
/// in degraded mode and reports zero detections.
pub async fn load_detector(config: &Config) -> Arc<dyn Detector> {
    let weights = config.model_weights();
    if !Path::new(weights).exists() {
        warn!(weights = %weights, "model_unavailable");
        return Arc::new(UnavailableDetector);
    }

    match SidecarDetector::new(SidecarParams::from_config(config)) {
        Ok(detector) => {
            info!(weights = %weights, endpoint = %config.model_endpoint(), "model_loaded");
            if config.warm_up() {
                detector.warm_up().await;
            }
            Arc::new(detector)
        }
        Err(e) => {
            warn!(weights = %weights, error = %e, "model_unavailable");
            Arc::new(UnavailableDetector)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_detector_detects_nothing() {
        let detector = UnavailableDetector;
        let output = detector.detect(Arc::new(RgbImage::new(8, 8))).await.unwrap();
        assert!(output.detections.is_empty());
        assert!(!detector.is_loaded());
    }

    #[tokio::test]
    async fn test_missing_weights_degrades() {
        let config = Config::default().with_model_weights("/nonexistent/weights/best.pt");
        let detector = load_detector(&config).await;
        assert!(!detector.is_loaded());
        assert_eq!(detector.name(), "unavailable");
    }

    #[test]
    fn test_predict_response_parsing() {
        let json = r#"{"detections":[{"class_id":4,"confidence":0.91,"box":[10.0,20.0,110.0,140.5]}]}"#;
        let parsed: PredictResponse = serde_json::from_str(json).unwrap();
        let detections = parsed
            .detections
            .into_iter()
            .map(RawDetection::try_from)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 4);
        assert_eq!(detections[0].confidence, 0.91);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 20.0, 110.0, 140.5));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        for confidence in [1.5, -0.2, f64::NAN] {
            let predicted = PredictedBox { class_id: 0, confidence, xyxy: [0.0, 0.0, 4.0, 4.0] };
            let result = RawDetection::try_from(predicted);
            assert!(matches!(result, Err(EngineError::Inference(_))), "confidence {}", confidence);
        }

        let edge = PredictedBox { class_id: 0, confidence: 1.0, xyxy: [0.0, 0.0, 4.0, 4.0] };
        assert_eq!(RawDetection::try_from(edge).unwrap().confidence, 1.0);
    }

    #[test]
    fn test_predict_response_without_detections() {
        let parsed: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.detections.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_is_inference_error() {
        let params = SidecarParams {
            weights: "best.pt".to_string(),
            endpoint: "http://127.0.0.1:9/predict".to_string(),
            timeout: Duration::from_millis(500),
            candidate_confidence: 0.1,
            iou: 0.45,
            input_size: 32,
            augment: false,
        };
        let detector = SidecarDetector::new(params).unwrap();

        let result = detector.detect(Arc::new(RgbImage::new(32, 32))).await;

        assert!(matches!(result, Err(EngineError::Inference(_))));
    }
}
