//! Mock inference sidecar
//!
//! Speaks the same `/predict` JSON contract as the real model host and
//! answers with a fixed, scripted set of boxes, so the POS service can be
//! exercised end to end without weights or a GPU.
//!
//! Each scripted detection is `class_id:confidence`. Boxes are laid out
//! left to right across the submitted image. Like the real host, scripted
//! detections below the request's `conf` are not returned.
//!
//! Usage:
//!   cargo run --bin mock-inference -- --port 9000 --detections 0:0.91,0:0.72,4:0.64

use bakery_pos::io::detector::{PredictRequest, PredictResponse, PredictedBox};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mock-inference")]
#[command(about = "Scripted stand-in for the bread detection model host")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Comma separated `class_id:confidence` pairs returned for every image
    #[arg(short, long, default_value = "0:0.91,0:0.72,4:0.64,6:0.33")]
    detections: String,

    /// Artificial inference latency (ms)
    #[arg(long, default_value = "0")]
    latency_ms: u64,
}

fn parse_script(script: &str) -> Result<Vec<(u32, f64)>, String> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (class_id, confidence) =
                pair.split_once(':').ok_or_else(|| format!("expected class_id:confidence, got '{}'", pair))?;
            let class_id = class_id.parse::<u32>().map_err(|e| format!("bad class id '{}': {}", class_id, e))?;
            let confidence =
                confidence.parse::<f64>().map_err(|e| format!("bad confidence '{}': {}", confidence, e))?;
            Ok((class_id, confidence))
        })
        .collect()
}

/// One column per scripted detection, inset by a tenth of the column width
fn layout(script: &[(u32, f64)], width: u32, height: u32, min_conf: f64) -> PredictResponse {
    let columns = script.len().max(1) as f32;
    let column_width = width as f32 / columns;
    let inset = column_width * 0.1;
    let detections = script
        .iter()
        .enumerate()
        .filter(|(_, (_, confidence))| *confidence >= min_conf)
        .map(|(i, &(class_id, confidence))| {
            let left = column_width * i as f32;
            PredictedBox {
                class_id,
                confidence,
                xyxy: [
                    left + inset,
                    height as f32 * 0.2,
                    left + column_width - inset,
                    height as f32 * 0.8,
                ],
            }
        })
        .collect();
    PredictResponse { detections }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn bad_request(detail: String) -> Response<Full<Bytes>> {
    warn!(detail = %detail, "predict_rejected");
    let body = serde_json::json!({ "detail": detail }).to_string().into_bytes();
    json_response(StatusCode::BAD_REQUEST, body)
}

async fn handle(
    req: Request<Incoming>,
    script: Arc<Vec<(u32, f64)>>,
    latency_ms: u64,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::POST || req.uri().path() != "/predict" {
        return Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"Not Found")))
            .expect("static response should not fail"));
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return Ok(bad_request(format!("failed to read body: {}", e))),
    };
    let request: PredictRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return Ok(bad_request(format!("malformed request: {}", e))),
    };
    let image_len = match STANDARD.decode(request.image.as_bytes()) {
        Ok(image) => image.len(),
        Err(e) => return Ok(bad_request(format!("image is not base64: {}", e))),
    };

    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }

    let response = layout(&script, request.width, request.height, request.conf);
    info!(
        weights = %request.weights,
        width = %request.width,
        height = %request.height,
        image_bytes = %image_len,
        returned = %response.detections.len(),
        "predict"
    );

    match serde_json::to_vec(&response) {
        Ok(body) => Ok(json_response(StatusCode::OK, body)),
        Err(e) => Ok(bad_request(format!("response encoding: {}", e))),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let script = Arc::new(parse_script(&args.detections)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, scripted = %script.len(), "mock_inference_listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let script = script.clone();
        let latency_ms = args.latency_ms;

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, script.clone(), latency_ms));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(error = %e, "connection_error");
            }
        });
    }
}
