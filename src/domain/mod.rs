//! Domain models - the data that flows through a scan or a checkout
//!
//! This module contains the canonical data types used throughout the system:
//! - `RawDetection` - one object reported by the detection model
//! - `AggregatedItem` - per-class count and representative confidence
//! - `LineItem` / `PricedOrder` - catalog-joined view with totals
//! - `CartEntry` / `Receipt` - checkout input and output
//! - `Catalog` - static class -> (price, display name) lookup

pub mod catalog;
pub mod types;

// Re-export commonly used types at module level
pub use catalog::{Catalog, CatalogEntry, ClassLabels};
pub use types::{
    AggregatedItem, BoundingBox, CartEntry, ConfidenceThreshold, LineItem, PricedOrder,
    RawDetection, Receipt,
};
