//! Shared types for the detection, pricing and checkout flows

use serde::{Deserialize, Serialize};

/// Axis-aligned box in the pixel space of the image that was fed to the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Clamp to an image of the given size and round to whole pixels.
    /// Returns (x, y, width, height), or None when nothing of the box is visible.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> Option<(i32, i32, u32, u32)> {
        let max_x = image_width as f32;
        let max_y = image_height as f32;
        let x1 = self.x1.clamp(0.0, max_x).round();
        let y1 = self.y1.clamp(0.0, max_y).round();
        let x2 = self.x2.clamp(0.0, max_x).round();
        let y2 = self.y2.clamp(0.0, max_y).round();

        let width = (x2 - x1) as u32;
        let height = (y2 - y1) as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some((x1 as i32, y1 as i32, width, height))
    }
}

/// One object instance reported by the detection model for one image
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl RawDetection {
    #[inline]
    pub fn new(class_id: u32, confidence: f64, bbox: BoundingBox) -> Self {
        Self { class_id, confidence, bbox }
    }
}

/// Operating confidence threshold, guaranteed to lie in [0, 1]
///
/// Distinct from the candidate threshold the model itself runs with.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConfidenceThreshold(f64);

impl ConfidenceThreshold {
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.0
    }

    #[inline]
    pub fn admits(&self, confidence: f64) -> bool {
        confidence >= self.0
    }
}

impl Default for ConfidenceThreshold {
    fn default() -> Self {
        Self(0.50)
    }
}

impl std::fmt::Display for ConfidenceThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Per-class fold of the detections that survived filtering
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedItem {
    pub class_key: String,
    pub count: u32,
    pub avg_confidence: f64,
}

/// A catalog-joined row of a priced order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub class_key: String,
    pub display_name: String,
    pub count: u32,
    pub unit_price: u64,
    /// Present for lines derived from detections, absent for cart lines
    pub avg_confidence: Option<f64>,
}

impl LineItem {
    /// `unit_price * count`, or `None` when it does not fit in a u64
    #[inline]
    pub fn subtotal(&self) -> Option<u64> {
        self.unit_price.checked_mul(u64::from(self.count))
    }
}

/// Line items plus their totals, all in integer minor currency units
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PricedOrder {
    pub items: Vec<LineItem>,
    pub total_count: u64,
    pub total_price: u64,
}

impl PricedOrder {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Checkout input: identity and quantity only, never a price
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartEntry {
    #[serde(rename = "bread_name")]
    pub class_key: String,
    pub count: u32,
}

impl CartEntry {
    pub fn new(class_key: impl Into<String>, count: u32) -> Self {
        Self { class_key: class_key.into(), count }
    }
}

/// Output record of one checkout call, never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub receipt_number: String,
    pub total_count: u64,
    pub total_price: u64,
    /// ISO-8601, same instant as the one encoded in `receipt_number`
    pub timestamp: String,
    pub items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_threshold_bounds() {
        assert!(ConfidenceThreshold::new(0.0).is_some());
        assert!(ConfidenceThreshold::new(1.0).is_some());
        assert!(ConfidenceThreshold::new(-0.01).is_none());
        assert!(ConfidenceThreshold::new(1.01).is_none());
        assert!(ConfidenceThreshold::new(f64::NAN).is_none());
        assert_eq!(ConfidenceThreshold::default().value(), 0.50);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let threshold = ConfidenceThreshold::new(0.5).unwrap();
        assert!(threshold.admits(0.5));
        assert!(threshold.admits(0.9));
        assert!(!threshold.admits(0.4999));
    }

    #[test]
    fn test_pixel_rect_clamps_to_image() {
        let bbox = BoundingBox::new(-10.0, 5.4, 120.0, 40.6);
        assert_eq!(bbox.to_pixel_rect(100, 100), Some((0, 5, 100, 36)));
    }

    #[test]
    fn test_pixel_rect_outside_image() {
        let bbox = BoundingBox::new(150.0, 150.0, 200.0, 200.0);
        assert_eq!(bbox.to_pixel_rect(100, 100), None);
    }

    #[test]
    fn test_cart_entry_wire_name() {
        let entry: CartEntry =
            serde_json::from_str(r#"{"bread_name":"muffin","count":2}"#).unwrap();
        assert_eq!(entry, CartEntry::new("muffin", 2));
    }

    #[test]
    fn test_line_item_subtotal() {
        let line = LineItem {
            class_key: "pie".to_string(),
            display_name: "호두파이(조각)".to_string(),
            count: 3,
            unit_price: 4700,
            avg_confidence: None,
        };
        assert_eq!(line.subtotal(), Some(14100));
    }

    #[test]
    fn test_line_item_subtotal_overflow() {
        let line = LineItem {
            class_key: "pie".to_string(),
            display_name: "pie".to_string(),
            count: u32::MAX,
            unit_price: u64::MAX / 2,
            avg_confidence: None,
        };
        assert_eq!(line.subtotal(), None);
    }
}
