//! Lock-free metrics collection
//!
//! Uses atomics so concurrent scans and checkouts never contend on a lock.
//!
//! NOTE: All atomics use Relaxed ordering: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Exponential bucket boundaries for scan latency (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800
pub const SCAN_LATENCY_BOUNDS_MS: [u64; 10] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];
pub const SCAN_LATENCY_NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    SCAN_LATENCY_BOUNDS_MS.partition_point(|&bound| bound < latency_ms)
}

/// Counters shared by every request
#[derive(Debug, Default)]
pub struct Metrics {
    scans_total: AtomicU64,
    scans_failed: AtomicU64,
    scans_empty: AtomicU64,
    candidates_total: AtomicU64,
    detections_kept_total: AtomicU64,
    items_recognized_total: AtomicU64,
    checkouts_total: AtomicU64,
    checkout_items_total: AtomicU64,
    checkout_revenue_total: AtomicU64,
    scan_latency_sum_ms: AtomicU64,
    scan_latency_buckets: [AtomicU64; SCAN_LATENCY_NUM_BUCKETS],
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub scans_total: u64,
    pub scans_failed: u64,
    pub scans_empty: u64,
    pub candidates_total: u64,
    pub detections_kept_total: u64,
    pub items_recognized_total: u64,
    pub checkouts_total: u64,
    pub checkout_items_total: u64,
    pub checkout_revenue_total: u64,
    pub scan_latency_sum_ms: u64,
    pub scan_latency_buckets: [u64; SCAN_LATENCY_NUM_BUCKETS],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed scan
    pub fn record_scan(&self, candidates: usize, kept: usize, items: u64, latency_ms: u64) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        self.candidates_total.fetch_add(candidates as u64, Ordering::Relaxed);
        self.detections_kept_total.fetch_add(kept as u64, Ordering::Relaxed);
        self.items_recognized_total.fetch_add(items, Ordering::Relaxed);
        if kept == 0 {
            self.scans_empty.fetch_add(1, Ordering::Relaxed);
        }
        self.scan_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.scan_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_failure(&self) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkout(&self, total_count: u64, total_price: u64) {
        self.checkouts_total.fetch_add(1, Ordering::Relaxed);
        self.checkout_items_total.fetch_add(total_count, Ordering::Relaxed);
        self.checkout_revenue_total.fetch_add(total_price, Ordering::Relaxed);
    }

    /// Load all counters without resetting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut buckets = [0u64; SCAN_LATENCY_NUM_BUCKETS];
        for (i, bucket) in self.scan_latency_buckets.iter().enumerate() {
            buckets[i] = bucket.load(Ordering::Relaxed);
        }
        MetricsSnapshot {
            scans_total: self.scans_total.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            scans_empty: self.scans_empty.load(Ordering::Relaxed),
            candidates_total: self.candidates_total.load(Ordering::Relaxed),
            detections_kept_total: self.detections_kept_total.load(Ordering::Relaxed),
            items_recognized_total: self.items_recognized_total.load(Ordering::Relaxed),
            checkouts_total: self.checkouts_total.load(Ordering::Relaxed),
            checkout_items_total: self.checkout_items_total.load(Ordering::Relaxed),
            checkout_revenue_total: self.checkout_revenue_total.load(Ordering::Relaxed),
            scan_latency_sum_ms: self.scan_latency_sum_ms.load(Ordering::Relaxed),
            scan_latency_buckets: buckets,
        }
    }
}

impl MetricsSnapshot {
    /// Log a one-line summary
    pub fn log(&self) {
        info!(
            scans = %self.scans_total,
            scans_failed = %self.scans_failed,
            scans_empty = %self.scans_empty,
            detections_kept = %self.detections_kept_total,
            checkouts = %self.checkouts_total,
            revenue = %self.checkout_revenue_total,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(25), 0);
        assert_eq!(bucket_index(26), 1);
        assert_eq!(bucket_index(12800), 9);
        assert_eq!(bucket_index(50_000), 10);
    }

    #[test]
    fn test_record_scan() {
        let metrics = Metrics::new();
        metrics.record_scan(12, 4, 4, 180);
        metrics.record_scan(3, 0, 0, 20);
        metrics.record_scan_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.scans_total, 3);
        assert_eq!(snap.scans_failed, 1);
        assert_eq!(snap.scans_empty, 1);
        assert_eq!(snap.candidates_total, 15);
        assert_eq!(snap.detections_kept_total, 4);
        assert_eq!(snap.scan_latency_sum_ms, 200);
        assert_eq!(snap.scan_latency_buckets[0], 1);
        assert_eq!(snap.scan_latency_buckets[3], 1);
    }

    #[test]
    fn test_record_checkout() {
        let metrics = Metrics::new();
        metrics.record_checkout(3, 10900);
        metrics.record_checkout(0, 0);

        let snap = metrics.snapshot();
        assert_eq!(snap.checkouts_total, 2);
        assert_eq!(snap.checkout_items_total, 3);
        assert_eq!(snap.checkout_revenue_total, 10900);
    }
}
