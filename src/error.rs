//! Error taxonomy for the scan and checkout flows
//!
//! Unknown classes and empty results are not errors: they are carried in the
//! data (price 0, `ScanStatus::NothingRecognized`).

use thiserror::Error;

/// Request-level failures. No partial result is produced for any of these.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// A priced order whose totals do not fit the integer price range
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("price total overflows for '{0}'")]
    Overflow(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate catalog entry for class '{0}'")]
    DuplicateClass(String),

    #[error("duplicate catalog display name '{0}'")]
    DuplicateDisplayName(String),
}
