//! Operating-threshold filter applied on top of the model's own candidates
//!
//! The model runs with a permissive candidate threshold to maximise recall;
//! precision is controlled here, independently of the model's tuning.

use crate::domain::{ConfidenceThreshold, RawDetection};

/// Keep the detections whose confidence is at least `threshold`.
/// A zero-confidence detection is never kept, even at `threshold == 0`.
pub fn filter_detections(
    detections: &[RawDetection],
    threshold: ConfidenceThreshold,
) -> Vec<&RawDetection> {
    detections
        .iter()
        .filter(|d| d.confidence > 0.0 && threshold.admits(d.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundingBox, ClassLabels};
    use crate::services::aggregator::aggregate;

    fn det(class_id: u32, confidence: f64) -> RawDetection {
        RawDetection::new(class_id, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_filter_drops_low_confidence() {
        let detections = vec![det(0, 0.12), det(0, 0.55), det(1, 0.49), det(2, 0.93)];
        let threshold = ConfidenceThreshold::new(0.5).unwrap();

        let kept = filter_detections(&detections, threshold);

        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|d| d.confidence >= 0.5));
        assert!(kept.iter().all(|d| detections.contains(d)));
    }

    #[test]
    fn test_filter_boundary_is_kept() {
        let detections = vec![det(0, 0.7)];
        let kept = filter_detections(&detections, ConfidenceThreshold::new(0.7).unwrap());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_filter_threshold_extremes() {
        let detections = vec![det(0, 0.0), det(1, 0.3), det(2, 1.0)];

        let all = filter_detections(&detections, ConfidenceThreshold::new(0.0).unwrap());
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| d.confidence > 0.0));

        let strict = filter_detections(&detections, ConfidenceThreshold::new(1.0).unwrap());
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].class_id, 2);
    }

    #[test]
    fn test_zero_threshold_aggregates_positive_confidence_only() {
        let detections = vec![det(0, 0.0), det(0, 0.4), det(1, 0.0)];
        let labels = ClassLabels::new(vec!["croissant".to_string(), "muffin".to_string()]);

        let kept = filter_detections(&detections, ConfidenceThreshold::new(0.0).unwrap());
        let aggregation = aggregate(kept, &labels);

        assert_eq!(aggregation.len(), 1);
        let croissant = aggregation.get("croissant").unwrap();
        assert_eq!(croissant.count, 1);
        assert_eq!(croissant.avg_confidence, 0.4);
        assert!(aggregation.get("muffin").is_none());
    }

    #[test]
    fn test_filter_empty_input() {
        let kept = filter_detections(&[], ConfidenceThreshold::default());
        assert!(kept.is_empty());
    }
}
