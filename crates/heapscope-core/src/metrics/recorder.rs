//! Metrics recording utilities
//!
//! This module provides functions to record profiler metrics.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a finished partition scan
pub fn record_partition_scanned(strategy: &str, status: &str, duration: Duration) {
    let labels = [
        ("strategy", strategy.to_string()),
        ("status", status.to_string()),
    ];

    counter!("heapscope_partitions_scanned_total", &labels).increment(1);
    histogram!("heapscope_partition_scan_duration_seconds", &labels)
        .record(duration.as_secs_f64());
}

/// Record samples collected in one partition
pub fn record_samples(count: u64) {
    counter!("heapscope_samples_total").increment(count);
}

/// Record a single entry whose size could not be estimated
pub fn record_estimation_failure() {
    counter!("heapscope_estimation_failures_total").increment(1);
}

/// Record a completed member report
pub fn record_node_report(member: &str, max_size_bytes: u64, failed: bool) {
    let labels = [("member", member.to_string())];

    counter!(
        "heapscope_node_reports_total",
        "status" => if failed { "error" } else { "ok" }
    )
    .increment(1);
    gauge!("heapscope_node_max_entry_bytes", &labels).set(max_size_bytes as f64);
}
