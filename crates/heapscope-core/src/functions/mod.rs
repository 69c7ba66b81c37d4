//! Entry-point analysis functions
//!
//! Thin wrappers a cache member runs on behalf of a caller. Each one drives
//! the shared profiling engine and shapes its result for the wire:
//!
//! - [`RegionSizeAnalyzer`]: structured summary of one partition
//! - [`MaxSizeSummarizer`]: line-oriented report over every partition
//! - [`TopNByteSizes`]: the N largest entries of one partition, unsampled
//!
//! A function never propagates a failure to its caller; it produces a
//! terminal [`FunctionOutput::Error`] instead.

pub mod region;
pub mod summarizer;
pub mod top_n;

pub use region::{RegionAnalysis, RegionSizeAnalyzer};
pub use summarizer::MaxSizeSummarizer;
pub use top_n::TopNByteSizes;

use serde::Serialize;
use tracing::error;

use crate::error::{ProfilerError, Result};
use crate::profiler::report;
use crate::storage::{CacheHost, PartitionPath};

/// What a function hands back to its caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum FunctionOutput {
    /// A single structured result.
    Summary(RegionAnalysis),
    /// Ordered result lines; the last one is terminal.
    Lines(Vec<String>),
    /// Terminal error, formatted as `Error in <id>: <message>`.
    Error(String),
}

impl FunctionOutput {
    /// Whether the function failed.
    pub fn is_error(&self) -> bool {
        matches!(self, FunctionOutput::Error(_))
    }

    /// Plain-text rendering, one result per line.
    pub fn to_text(&self) -> String {
        match self {
            FunctionOutput::Summary(analysis) => analysis.to_text(),
            FunctionOutput::Lines(lines) => {
                let mut text = lines.join("\n");
                text.push('\n');
                text
            }
            FunctionOutput::Error(message) => format!("{}\n", message),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        report::to_json(self)
    }
}

/// A function executed against one cache member.
pub trait AnalysisFunction<H: CacheHost> {
    /// Stable function identifier.
    fn id(&self) -> &'static str;

    /// Run the function, reporting failure through the `Err` variant.
    fn try_execute(&self, host: &H, args: &[String]) -> Result<FunctionOutput>;

    /// Run the function. Always yields a terminal output.
    fn execute(&self, host: &H, args: &[String]) -> FunctionOutput {
        match self.try_execute(host, args) {
            Ok(output) => output,
            Err(e) => {
                let message = format!("Error in {}: {}", self.id(), e);
                error!(
                    function = self.id(),
                    member = %host.member_name(),
                    error = %e,
                    "Function failed"
                );
                FunctionOutput::Error(message)
            }
        }
    }
}

/// Partition path argument at `index`.
fn partition_arg(args: &[String], index: usize) -> Result<PartitionPath> {
    args.get(index)
        .filter(|a| !a.trim().is_empty())
        .map(PartitionPath::new)
        .ok_or_else(|| ProfilerError::InvalidArgument("a partition path is required".to_string()))
}
