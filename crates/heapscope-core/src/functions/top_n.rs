//! Exact top-N of a single partition.

use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{partition_arg, AnalysisFunction, FunctionOutput};
use crate::config::Config;
use crate::error::{ProfilerError, Result};
use crate::profiler::report::format_thousands;
use crate::profiler::{bytes_to_mib, PartitionScanner, SamplingEngine, ScanStatus, TopKSet};
use crate::sizing::SizeEstimator;
use crate::storage::CacheHost;

const RULE: &str =
    "================================================================================";
const THIN_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Visits every entry of `args[0]` and returns its `args[1]` (default
/// [`crate::config::TopNConfig::default_n`]) largest values, descending.
pub struct TopNByteSizes<E: ?Sized> {
    estimator: Arc<E>,
    default_n: usize,
}

impl<E: ?Sized> TopNByteSizes<E> {
    /// Function identifier.
    pub const ID: &'static str = "TopNByteSizesPerServerFunction";

    /// Create the function.
    pub fn new(estimator: Arc<E>, config: &Config) -> Self {
        Self {
            estimator,
            default_n: config.top_n.default_n,
        }
    }

    fn requested_n(&self, args: &[String]) -> Result<usize> {
        match args.get(1) {
            None => Ok(self.default_n),
            Some(raw) => raw.trim().parse().map_err(|_| {
                ProfilerError::InvalidArgument(format!(
                    "N must be a non-negative integer, got {:?}",
                    raw
                ))
            }),
        }
    }
}

impl<H, E> AnalysisFunction<H> for TopNByteSizes<E>
where
    H: CacheHost,
    E: SizeEstimator<H::Value> + ?Sized,
{
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn try_execute(&self, host: &H, args: &[String]) -> Result<FunctionOutput> {
        let started = Instant::now();
        let member = host.member_name();
        let path = partition_arg(args, 0)?;
        let n = self.requested_n(args)?;
        info!(
            function = Self::ID,
            member = %member,
            partition = %path,
            n,
            "Finding largest entries"
        );

        // the budget is irrelevant for an exhaustive scan
        let scanner = PartitionScanner::new(
            host,
            self.estimator.as_ref(),
            SamplingEngine::default(),
            n,
        );
        let summary = scanner.scan_exhaustive(&path);
        if summary.status == ScanStatus::Error {
            return Err(ProfilerError::PartitionScan(
                summary.error_message.unwrap_or_default(),
            ));
        }

        if summary.top_k.is_empty() {
            info!(member = %member, partition = %path, "No entries found");
            return Ok(FunctionOutput::Lines(vec!["0".to_string()]));
        }

        let lines: Vec<String> = summary.top_k.iter().map(ToString::to_string).collect();
        for (rank, line) in lines.iter().enumerate() {
            debug!(member = %member, rank = rank + 1, "{}", line);
        }
        info!("{}", banner(path.name(), &member, n, &summary.top_k, started.elapsed()));

        Ok(FunctionOutput::Lines(lines))
    }
}

/// Multi-line summary logged after a successful run.
fn banner(partition: &str, member: &str, n: usize, top: &TopKSet, elapsed: Duration) -> String {
    let mut out = String::from("\n");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(
        out,
        "SUMMARY: Top {} largest entries in partition '{}' on member '{}'",
        n, partition, member
    );
    let _ = writeln!(out, "{}", RULE);

    for (i, sample) in top.iter().enumerate() {
        let _ = writeln!(out, "#{} - Key: {}", i + 1, sample.identifier);
        let _ = writeln!(
            out,
            "     Size: {} bytes ({:.2} MB)",
            format_thousands(sample.size_bytes),
            sample.size_mib()
        );
        out.push('\n');
    }

    let total = top.total_size_bytes();
    let _ = writeln!(out, "{}", THIN_RULE);
    let _ = writeln!(
        out,
        "Total size of top {} entries: {} bytes ({:.2} MB)",
        top.len(),
        format_thousands(total),
        bytes_to_mib(total)
    );
    let _ = writeln!(
        out,
        "Total execution time: {} ms ({:.2} seconds)",
        format_thousands(elapsed.as_millis() as u64),
        elapsed.as_secs_f64()
    );
    out.push_str(RULE);
    out
}
