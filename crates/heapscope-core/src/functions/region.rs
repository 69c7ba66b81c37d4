//! Single-partition analysis with a structured result.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::{partition_arg, AnalysisFunction, FunctionOutput};
use crate::config::Config;
use crate::error::Result;
use crate::profiler::report;
use crate::profiler::{
    PartitionScanner, PartitionSummary, Recommendation, Recommender, SamplingEngine,
};
use crate::sizing::SizeEstimator;
use crate::storage::CacheHost;

/// Result of [`RegionSizeAnalyzer`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionAnalysis {
    /// Member the partition lives on.
    pub member_name: String,
    /// Scan result.
    #[serde(flatten)]
    pub summary: PartitionSummary,
    /// Present only when at least one sample was collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

impl RegionAnalysis {
    /// Plain-text rendering.
    pub fn to_text(&self) -> String {
        let mut text = format!("Member: {}\n", self.member_name);
        text.push_str(&report::render_partition(&self.summary));
        if let Some(rec) = &self.recommendation {
            text.push_str(&format!(
                "G1 recommendation: {} ({})\n",
                rec.region_size_label, rec.reason_text
            ));
        }
        text
    }
}

/// Samples one partition (`args[0]`) and recommends a region size from its
/// largest sample.
pub struct RegionSizeAnalyzer<E: ?Sized> {
    estimator: Arc<E>,
    engine: SamplingEngine,
    top_k: usize,
}

impl<E: ?Sized> RegionSizeAnalyzer<E> {
    /// Function identifier.
    pub const ID: &'static str = "RegionSizeAnalyzer";

    /// Create the function from the sampling and scan configuration.
    pub fn new(estimator: Arc<E>, config: &Config) -> Self {
        Self {
            estimator,
            engine: SamplingEngine::new(config.sampling.clone()),
            top_k: config.scan.top_k,
        }
    }
}

impl<H, E> AnalysisFunction<H> for RegionSizeAnalyzer<E>
where
    H: CacheHost,
    E: SizeEstimator<H::Value> + ?Sized,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn try_execute(&self, host: &H, args: &[String]) -> Result<FunctionOutput> {
        let path = partition_arg(args, 0)?;
        let scanner =
            PartitionScanner::new(host, self.estimator.as_ref(), self.engine.clone(), self.top_k);
        let summary = scanner.scan(&path);

        let recommendation = summary.max_size_bytes().map(Recommender::recommend);
        info!(
            function = Self::ID,
            partition = %path,
            status = summary.status.as_str(),
            sampled = summary.sampled_count,
            recommendation = recommendation
                .as_ref()
                .map(|r| r.region_size_label.as_str())
                .unwrap_or("none"),
            "Partition analysis finished"
        );

        Ok(FunctionOutput::Summary(RegionAnalysis {
            member_name: host.member_name(),
            summary,
            recommendation,
        }))
    }
}
