//! Services - business logic
//!
//! - `filter` - Confidence threshold filter
//! - `aggregator` - Per-class counts and running confidence
//! - `pricing` - Catalog price resolution
//! - `checkout` - Receipt generation
//! - `scaling` - Input image size cap
//! - `engine` - Composes the above into detect / price / checkout

pub mod aggregator;
pub mod checkout;
pub mod engine;
pub mod filter;
pub mod pricing;
pub mod scaling;

// Re-export commonly used types
pub use engine::{DetectionOutcome, Engine, ScanStatus};
