//! HTTP API for the POS front end
//!
//! Thin plumbing around the engine: body extraction, JSON (de)serialization,
//! CORS, and mapping engine failures to a single 500 category.
//! Uses hyper for the HTTP server.

use crate::domain::CartEntry;
use crate::error::PricingError;
use crate::infra::config::Config;
use crate::io::api::{
    CartRequest, CheckoutResponse, DetectionResponse, ErrorResponse, HealthResponse,
    PriceListResponse, PriceResponse,
};
use crate::io::imaging;
use crate::io::prometheus::format_prometheus_metrics;
use crate::io::upload::extract_image;
use crate::services::engine::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE, ORIGIN};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared, read-only state handed to every connection
pub struct AppState {
    engine: Arc<Engine>,
    cors_origins: Vec<String>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, cors_origins: Vec<String>, max_body_bytes: usize) -> Self {
        Self { engine, cors_origins, max_body_bytes }
    }

    pub fn from_config(config: &Config, engine: Arc<Engine>) -> Self {
        Self::new(engine, config.cors_origins().to_vec(), config.max_body_bytes())
    }

    /// `Some(credentials)` when `origin` may call the API. Only explicitly
    /// listed origins get credentials; a `*` entry admits any origin without.
    fn cors_grant(&self, origin: &str) -> Option<bool> {
        if self.cors_origins.iter().any(|o| o == origin) {
            Some(true)
        } else if self.cors_origins.iter().any(|o| o == "*") {
            Some(false)
        } else {
            None
        }
    }
}

/// Request-level failure, rendered as JSON `{ "detail": ... }`
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .expect("static response should not fail"),
        Err(e) => {
            error!(error = %e, "response_serialization_failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("static response should not fail")
}

fn error_response(err: ApiError) -> Response<Full<Bytes>> {
    json_response(err.status, &ErrorResponse { detail: err.detail })
}

/// Collect the body, enforcing the upload cap
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {} bytes", limit),
        )),
        Err(e) => Err(ApiError::new(StatusCode::BAD_REQUEST, format!("failed to read body: {}", e))),
    }
}

fn parse_cart(body: &[u8]) -> Result<Vec<CartEntry>, ApiError> {
    let request: CartRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid cart: {}", e)))?;
    if let Some(entry) = request.items.iter().find(|e| e.count == 0) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("invalid cart: count for '{}' must be positive", entry.class_key),
        ));
    }
    Ok(request.items)
}

fn pricing_rejected(e: PricingError) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, format!("invalid cart: {}", e))
}

async fn handle_detect<B>(
    state: &AppState,
    content_type: Option<String>,
    body: B,
) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let body = read_body(body, state.max_body_bytes).await?;
    let upload = extract_image(content_type.as_deref(), body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let processing_error =
        |e: String| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("처리 중 오류 발생: {}", e));

    let image = tokio::task::spawn_blocking(move || imaging::decode_image(&upload))
        .await
        .map_err(|e| processing_error(e.to_string()))?
        .map_err(|e| {
            state.engine.metrics().record_scan_failure();
            warn!(error = %e, "image_decode_failed");
            processing_error(e.to_string())
        })?;

    let outcome = state.engine.detect(image).await.map_err(|e| processing_error(e.to_string()))?;
    Ok(json_response(StatusCode::OK, &DetectionResponse::from(outcome)))
}

async fn handle_cart_price<B>(state: &AppState, body: B) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let body = read_body(body, state.max_body_bytes).await?;
    let cart = parse_cart(&body)?;
    let order = state.engine.resolve_prices(&cart).map_err(pricing_rejected)?;
    debug!(lines = %order.items.len(), total_price = %order.total_price, "cart_priced");
    Ok(json_response(StatusCode::OK, &PriceResponse::from(order)))
}

async fn handle_checkout<B>(state: &AppState, body: B) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let body = read_body(body, state.max_body_bytes).await?;
    let cart = parse_cart(&body)?;
    let receipt = state.engine.checkout(&cart).map_err(pricing_rejected)?;
    Ok(json_response(StatusCode::OK, &CheckoutResponse::from(receipt)))
}

fn handle_health(state: &AppState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "healthy",
            service: "bakery-pos",
            version: env!("CARGO_PKG_VERSION"),
            build: env!("GIT_HASH"),
            model_loaded: state.engine.model_loaded(),
        },
    )
}

fn handle_price_list(state: &AppState) -> Response<Full<Bytes>> {
    let prices = state
        .engine
        .catalog()
        .price_list()
        .map(|(name, price)| (name.to_string(), price))
        .collect();
    json_response(StatusCode::OK, &PriceListResponse { prices })
}

fn handle_preflight(requested_headers: Option<HeaderValue>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            requested_headers.unwrap_or_else(|| HeaderValue::from_static("Content-Type")),
        )
        .header("Access-Control-Max-Age", "600")
        .body(Full::new(Bytes::new()))
        .expect("static response should not fail")
}

/// Route one request. Generic over the body so tests can drive it directly.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req.headers().get(ORIGIN).cloned();
    let content_type =
        req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
    let requested_headers = req.headers().get("Access-Control-Request-Headers").cloned();
    let body = req.into_body();

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/") => Ok(handle_health(&state)),
        (&Method::GET, "/health") => Ok(text_response(StatusCode::OK, "ok")),
        (&Method::GET, "/api/prices") => Ok(handle_price_list(&state)),
        (&Method::GET, "/metrics") => {
            let text = format_prometheus_metrics(state.engine.metrics(), state.engine.model_loaded());
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(text)))
                .expect("static response should not fail"))
        }
        (&Method::POST, "/api/detect") => handle_detect(&state, content_type, body).await,
        (&Method::POST, "/api/cart/price") => handle_cart_price(&state, body).await,
        (&Method::POST, "/api/checkout") => handle_checkout(&state, body).await,
        (&Method::OPTIONS, _) => Ok(handle_preflight(requested_headers)),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    };

    let mut response = result.unwrap_or_else(|e| {
        if e.status.is_server_error() {
            error!(method = %method, path = %path, status = %e.status.as_u16(), detail = %e.detail, "request_failed");
        } else {
            debug!(method = %method, path = %path, status = %e.status.as_u16(), detail = %e.detail, "request_rejected");
        }
        error_response(e)
    });

    if let Some(origin) = origin {
        if let Some(credentials) = origin.to_str().ok().and_then(|o| state.cors_grant(o)) {
            let headers = response.headers_mut();
            headers.insert("Access-Control-Allow-Origin", origin);
            if credentials {
                headers
                    .insert("Access-Control-Allow-Credentials", HeaderValue::from_static("true"));
            }
            headers.insert("Vary", HeaderValue::from_static("Origin"));
        }
    }

    Ok(response)
}

/// Accept connections until the shutdown signal flips to true
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

/// Bind the configured address and serve
pub async fn start_server(
    config: &Config,
    engine: Arc<Engine>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.port()).parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, Arc::new(AppState::from_config(config, engine)), shutdown).await
}
