//! IO modules - external system interfaces
//!
//! - `detector` - Object detector abstraction (inference sidecar, degraded mode)
//! - `imaging` - Image decode, JPEG encode, box annotation
//! - `upload` - Image extraction from multipart or raw request bodies
//! - `api` - JSON request/response schemas
//! - `http` - HTTP API server
//! - `prometheus` - Prometheus text exposition

pub mod api;
pub mod detector;
pub mod http;
pub mod imaging;
pub mod prometheus;
pub mod upload;

// Re-export commonly used types
pub use detector::{load_detector, Detector, ModelOutput};
