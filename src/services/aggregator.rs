//! Per-class folding of filtered detections
//!
//! The representative confidence is a recency-weighted halving recurrence:
//! `avg' = (avg + c) / 2` once an average exists, otherwise `avg' = c`.
//! It is NOT the arithmetic mean of the samples; three samples c1, c2, c3
//! yield `((c1 + c2) / 2 + c3) / 2`.

use crate::domain::{AggregatedItem, ClassLabels, RawDetection};
use rustc_hash::FxHashMap;

/// Aggregated items in first-seen class order
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    items: Vec<AggregatedItem>,
    index: FxHashMap<String, usize>,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one detection of `class_key` into the running state
    pub fn record(&mut self, class_key: String, confidence: f64) {
        let slot = match self.index.get(&class_key) {
            Some(&i) => i,
            None => {
                let i = self.items.len();
                self.index.insert(class_key.clone(), i);
                self.items.push(AggregatedItem { class_key, count: 0, avg_confidence: 0.0 });
                i
            }
        };

        let item = &mut self.items[slot];
        item.count += 1;
        item.avg_confidence = if item.avg_confidence > 0.0 {
            (item.avg_confidence + confidence) / 2.0
        } else {
            confidence
        };
    }

    pub fn get(&self, class_key: &str) -> Option<&AggregatedItem> {
        self.index.get(class_key).map(|&i| &self.items[i])
    }

    pub fn items(&self) -> &[AggregatedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was recognized. Not an error.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of counts across all classes
    pub fn total_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.count)).sum()
    }
}

/// Fold filtered detections into per-class counts and confidences
pub fn aggregate<'a, I>(detections: I, labels: &ClassLabels) -> Aggregation
where
    I: IntoIterator<Item = &'a RawDetection>,
{
    let mut aggregation = Aggregation::new();
    for detection in detections {
        aggregation.record(labels.key_for(detection.class_id), detection.confidence);
    }
    aggregation
}
