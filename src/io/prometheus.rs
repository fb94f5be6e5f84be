//! Prometheus text exposition of the engine counters

use crate::infra::metrics::{Metrics, SCAN_LATENCY_BOUNDS_MS, SCAN_LATENCY_NUM_BUCKETS};
use std::fmt::Write;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge)
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; SCAN_LATENCY_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[SCAN_LATENCY_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {cumulative}");
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(metrics: &Metrics, model_loaded: bool) -> String {
    let s = metrics.snapshot();
    let mut output = String::with_capacity(2048);

    write_metric(
        &mut output,
        "pos_model_loaded",
        "1 when detection weights are loaded, 0 in degraded mode",
        MetricType::Gauge,
        u64::from(model_loaded),
    );
    write_metric(&mut output, "pos_scans_total", "Scan requests", MetricType::Counter, s.scans_total);
    write_metric(
        &mut output,
        "pos_scans_failed_total",
        "Scans that failed (decode or inference)",
        MetricType::Counter,
        s.scans_failed,
    );
    write_metric(
        &mut output,
        "pos_scans_empty_total",
        "Scans where nothing was recognized",
        MetricType::Counter,
        s.scans_empty,
    );
    write_metric(
        &mut output,
        "pos_candidates_total",
        "Candidate boxes proposed by the model",
        MetricType::Counter,
        s.candidates_total,
    );
    write_metric(
        &mut output,
        "pos_detections_kept_total",
        "Detections above the operating threshold",
        MetricType::Counter,
        s.detections_kept_total,
    );
    write_metric(
        &mut output,
        "pos_items_recognized_total",
        "Items counted across all scans",
        MetricType::Counter,
        s.items_recognized_total,
    );
    write_histogram(
        &mut output,
        "pos_scan_latency_ms",
        "End-to-end scan latency in milliseconds",
        &s.scan_latency_buckets,
        &SCAN_LATENCY_BOUNDS_MS,
        s.scan_latency_sum_ms,
    );
    write_metric(
        &mut output,
        "pos_checkouts_total",
        "Receipts issued",
        MetricType::Counter,
        s.checkouts_total,
    );
    write_metric(
        &mut output,
        "pos_checkout_items_total",
        "Items sold across all receipts",
        MetricType::Counter,
        s.checkout_items_total,
    );
    write_metric(
        &mut output,
        "pos_checkout_revenue_total",
        "Revenue across all receipts (minor currency units)",
        MetricType::Counter,
        s.checkout_revenue_total,
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_scan(10, 3, 3, 120);
        metrics.record_scan(2, 0, 0, 30);
        metrics.record_checkout(3, 10900);

        let output = format_prometheus_metrics(&metrics, true);

        assert!(output.contains("pos_model_loaded 1"));
        assert!(output.contains("pos_scans_total 2"));
        assert!(output.contains("pos_scans_empty_total 1"));
        assert!(output.contains("pos_scan_latency_ms_bucket{le=\"50\"} 1"));
        assert!(output.contains("pos_scan_latency_ms_bucket{le=\"+Inf\"} 2"));
        assert!(output.contains("pos_scan_latency_ms_sum 150"));
        assert!(output.contains("pos_checkout_revenue_total 10900"));
    }

    #[test]
    fn test_degraded_gauge() {
        let output = format_prometheus_metrics(&Metrics::new(), false);
        assert!(output.contains("pos_model_loaded 0"));
    }
}
