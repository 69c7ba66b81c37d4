//! Report rendering
//!
//! Plain-text and JSON renderings of partition, member and cluster results.

use std::fmt::Write;

use serde::Serialize;

use super::aggregate::ClusterReport;
use super::node::NodeReport;
use super::sample::bytes_to_mib;
use super::scanner::{PartitionSummary, ScanStatus};
use crate::error::{ProfilerError, Result};

/// Format a count with `,` thousands separators.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1,234,567 bytes (1.18 MB)`
pub fn format_size(bytes: u64) -> String {
    format!("{} bytes ({:.2} MB)", format_thousands(bytes), bytes_to_mib(bytes))
}

/// Pretty-printed JSON for any report type.
pub fn to_json<T: Serialize + ?Sized>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| ProfilerError::Internal(format!("failed to serialize report: {}", e)))
}

/// Text block for one partition.
pub fn render_partition(summary: &PartitionSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Partition {} [{}]",
        summary.partition_name,
        summary.status.as_str()
    );
    let _ = writeln!(
        out,
        "  entries: {}",
        format_thousands(summary.total_entries)
    );

    match summary.status {
        ScanStatus::Empty => {}
        ScanStatus::Error => {
            let _ = writeln!(
                out,
                "  error: {}",
                summary.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        ScanStatus::Success => {
            if let Some(plan) = &summary.plan {
                let _ = writeln!(
                    out,
                    "  strategy: {} (interval {})",
                    plan.label(),
                    plan.interval()
                );
            }
            let _ = writeln!(out, "  sampled: {}", format_thousands(summary.sampled_count));
            if summary.estimation_failures > 0 {
                let _ = writeln!(
                    out,
                    "  skipped (estimation failed): {}",
                    format_thousands(summary.estimation_failures)
                );
            }
            match (summary.average_sampled_size_bytes, summary.max_size_bytes()) {
                (Some(avg), Some(max)) => {
                    let _ = writeln!(
                        out,
                        "  average: {:.1} bytes ({:.3} MB)",
                        avg,
                        avg / super::sample::BYTES_PER_MIB
                    );
                    let _ = writeln!(out, "  max: {}", format_size(max));
                }
                _ => {
                    let _ = writeln!(out, "  no samples collected");
                }
            }
            for (rank, sample) in summary.top_k.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:>3}. {} <{}> {}",
                    rank + 1,
                    sample.identifier,
                    sample.type_name,
                    format_size(sample.size_bytes)
                );
            }
        }
    }
    out
}

/// Text block for one member.
pub fn render_node(report: &NodeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Member {} ===", report.member_name);

    if let Some(error) = &report.error {
        let _ = writeln!(out, "ERROR: {}", error);
        return out;
    }

    for summary in &report.partition_summaries {
        out.push_str(&render_partition(summary));
    }
    let _ = writeln!(
        out,
        "Partitions: {}, entries: {}, sampled: {}",
        report.partition_summaries.len(),
        format_thousands(report.total_entries()),
        format_thousands(report.total_sampled())
    );
    let _ = writeln!(out, "Largest object: {}", format_size(report.overall_max_size_bytes));
    let _ = writeln!(
        out,
        "Recommendation: {} ({})",
        report.recommendation.region_size_label, report.recommendation.reason_text
    );
    out
}

/// Text block for the cluster roll-up, member blocks included.
pub fn render_cluster(report: &ClusterReport) -> String {
    let mut out = String::new();
    for node in &report.node_reports {
        out.push_str(&render_node(node));
        out.push('\n');
    }

    let _ = writeln!(out, "=== Cluster ===");
    let failed = report.failed_members().count();
    let _ = writeln!(
        out,
        "Members: {} ({} failed)",
        report.node_reports.len(),
        failed
    );
    let _ = write!(
        out,
        "Largest object: {}",
        format_size(report.cluster_max_size_bytes)
    );
    match &report.largest_member {
        Some(member) => {
            let _ = writeln!(out, " on {}", member);
        }
        None => out.push('\n'),
    }
    let _ = writeln!(
        out,
        "Recommendation: {} ({})",
        report.recommendation.region_size_label, report.recommendation.reason_text
    );
    let _ = writeln!(out, "{}", report.recommendation.jvm_flag());
    out
}
