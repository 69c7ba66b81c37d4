//! Whole-member summary as report lines.

use std::sync::Arc;

use super::{AnalysisFunction, FunctionOutput};
use crate::config::Config;
use crate::error::{ProfilerError, Result};
use crate::profiler::report::format_thousands;
use crate::profiler::{NodeReport, NodeReporter, SamplingEngine, ScanStatus};
use crate::sizing::SizeEstimator;
use crate::storage::CacheHost;

/// Reports the largest sampled object of every partition on the member and
/// the region size that fits the overall largest.
pub struct MaxSizeSummarizer<E: ?Sized> {
    estimator: Arc<E>,
    engine: SamplingEngine,
    top_k: usize,
}

impl<E: ?Sized> MaxSizeSummarizer<E> {
    /// Function identifier.
    pub const ID: &'static str = "MaxSizeSummarizer";

    /// Create the function from the sampling and scan configuration.
    pub fn new(estimator: Arc<E>, config: &Config) -> Self {
        Self {
            estimator,
            engine: SamplingEngine::new(config.sampling.clone()),
            top_k: config.scan.top_k,
        }
    }
}

impl<H, E> AnalysisFunction<H> for MaxSizeSummarizer<E>
where
    H: CacheHost,
    E: SizeEstimator<H::Value> + ?Sized,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn try_execute(&self, host: &H, _args: &[String]) -> Result<FunctionOutput> {
        let report = NodeReporter::new(
            host,
            self.estimator.as_ref(),
            self.engine.clone(),
            self.top_k,
        )
        .analyze();

        if let Some(error) = report.error {
            return Err(ProfilerError::Enumeration(error));
        }
        Ok(FunctionOutput::Lines(summary_lines(&report)))
    }
}

/// Render a member report in the summarizer's line format.
pub fn summary_lines(report: &NodeReport) -> Vec<String> {
    let mut lines = vec![
        format!("Analyzing on member: {}", report.member_name),
        String::new(),
    ];

    for summary in &report.partition_summaries {
        match summary.status {
            ScanStatus::Empty => {}
            ScanStatus::Error => lines.push(format!(
                "{}: ERROR - {}",
                summary.short_name(),
                summary.error_message.as_deref().unwrap_or("unknown error")
            )),
            ScanStatus::Success => {
                // partitions where nothing could be sized stay silent
                if let Some(max) = summary.max_size_bytes().filter(|&m| m > 0) {
                    lines.push(format!(
                        "{} ({} entries): max={} bytes ({:.3} MB)",
                        summary.short_name(),
                        format_thousands(summary.total_entries),
                        format_thousands(max),
                        summary.max_size_mib().unwrap_or_default()
                    ));
                }
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "LARGEST OBJECT: {} bytes ({:.3} MB)",
        format_thousands(report.overall_max_size_bytes),
        report.overall_max_size_mib()
    ));

    let recommendation = &report.recommendation;
    if recommendation.region_size_label.is_warning() {
        lines.push("WARNING: Object > 16MB will be humongous with 32M regions!".to_string());
    } else {
        lines.push(format!("RECOMMENDATION: Use {}", recommendation.jvm_flag()));
    }
    lines
}
