//! Partition scanning
//!
//! Drives one partition through the sampling plan, the size estimator and a
//! private [`TopKSelector`], producing an immutable [`PartitionSummary`].
//! A failing estimate only drops that entry; a failure to establish the
//! iteration itself marks the partition as errored.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::sample::{bytes_to_mib, Sample, TopKSet};
use super::sampling::{SamplingEngine, SamplingPlan, SamplingStrategy};
use super::topk::TopKSelector;
use crate::error::Result;
use crate::metrics::recorder;
use crate::sizing::SizeEstimator;
use crate::storage::{CacheHost, PartitionPath};

/// Outcome of a partition scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// The partition held no entries.
    Empty,
    /// The scan completed (possibly with zero samples).
    Success,
    /// The scan could not be carried out.
    Error,
}

impl ScanStatus {
    /// Status as reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Empty => "EMPTY",
            ScanStatus::Success => "SUCCESS",
            ScanStatus::Error => "ERROR",
        }
    }
}

/// Result of scanning one partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    /// Full partition path.
    pub partition_name: String,
    /// Entry count read at the start of the scan.
    pub total_entries: u64,
    /// Values whose size was successfully estimated.
    pub sampled_count: u64,
    /// Largest samples, descending.
    pub top_k: TopKSet,
    /// Mean sampled size; absent when nothing was sampled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_sampled_size_bytes: Option<f64>,
    /// Scan outcome.
    pub status: ScanStatus,
    /// Failure description for [`ScanStatus::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Plan the scan followed, absent for empty or failed partitions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SamplingPlan>,
    /// Entries skipped because estimation failed.
    #[serde(default)]
    pub estimation_failures: u64,
}

impl PartitionSummary {
    /// Summary of a partition with no entries.
    pub fn empty(partition_name: impl Into<String>) -> Self {
        Self {
            partition_name: partition_name.into(),
            total_entries: 0,
            sampled_count: 0,
            top_k: TopKSet::default(),
            average_sampled_size_bytes: None,
            status: ScanStatus::Empty,
            error_message: None,
            plan: None,
            estimation_failures: 0,
        }
    }

    /// Summary of a partition whose scan could not run.
    pub fn failed(
        partition_name: impl Into<String>,
        total_entries: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            total_entries,
            status: ScanStatus::Error,
            error_message: Some(message.into()),
            ..Self::empty(partition_name)
        }
    }

    /// Largest sampled size; absent when nothing was sampled.
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.top_k.max_size_bytes()
    }

    /// Largest sampled size in MiB.
    pub fn max_size_mib(&self) -> Option<f64> {
        self.max_size_bytes().map(bytes_to_mib)
    }

    /// Mean sampled size in MiB.
    pub fn average_sampled_size_mib(&self) -> Option<f64> {
        self.average_sampled_size_bytes.map(|b| b / super::sample::BYTES_PER_MIB)
    }

    /// Last segment of the partition path.
    pub fn short_name(&self) -> &str {
        PartitionPath::last_segment(&self.partition_name)
    }
}

/// Running totals for one scan.
struct Accumulator {
    selector: TopKSelector,
    sampled: u64,
    sum: u128,
    failures: u64,
}

impl Accumulator {
    fn new(k: usize) -> Self {
        Self {
            selector: TopKSelector::new(k),
            sampled: 0,
            sum: 0,
            failures: 0,
        }
    }

    fn record<V, E>(&mut self, estimator: &E, partition: &PartitionPath, id: String, value: &V)
    where
        E: SizeEstimator<V> + ?Sized,
    {
        match estimator.estimate_size(value) {
            Ok(size) => {
                self.sampled += 1;
                self.sum += u128::from(size);
                self.selector
                    .offer(Sample::new(id, estimator.type_name(value), size));
            }
            Err(e) => {
                self.failures += 1;
                recorder::record_estimation_failure();
                warn!(
                    partition = %partition,
                    key = %id,
                    error = %e,
                    "Skipping entry whose size could not be estimated"
                );
            }
        }
    }
}

/// Scans single partitions of a host.
pub struct PartitionScanner<'a, H: CacheHost, E: ?Sized> {
    host: &'a H,
    estimator: &'a E,
    engine: SamplingEngine,
    top_k: usize,
}

impl<'a, H, E> PartitionScanner<'a, H, E>
where
    H: CacheHost,
    E: SizeEstimator<H::Value> + ?Sized,
{
    /// Create a scanner retaining the `top_k` largest samples per partition.
    pub fn new(host: &'a H, estimator: &'a E, engine: SamplingEngine, top_k: usize) -> Self {
        Self {
            host,
            estimator,
            engine,
            top_k,
        }
    }

    /// Scan a partition using the configured sampling plan.
    pub fn scan(&self, path: &PartitionPath) -> PartitionSummary {
        let total_entries = match self.host.entry_count(path) {
            Ok(n) => n,
            Err(e) => return self.fail(path, 0, e.to_string()),
        };
        if total_entries == 0 {
            debug!(partition = %path, "Skipping empty partition");
            return PartitionSummary::empty(path.as_str());
        }

        let plan = self
            .engine
            .plan(total_entries, self.host.supports_bounded_fetch(path));
        self.run(path, plan)
    }

    /// Scan every entry of a partition, ignoring the sample budget.
    pub fn scan_exhaustive(&self, path: &PartitionPath) -> PartitionSummary {
        match self.host.entry_count(path) {
            Ok(0) => PartitionSummary::empty(path.as_str()),
            Ok(n) => self.run(path, SamplingEngine::exhaustive(n)),
            Err(e) => self.fail(path, 0, e.to_string()),
        }
    }

    fn run(&self, path: &PartitionPath, plan: SamplingPlan) -> PartitionSummary {
        let started = Instant::now();
        info!(
            partition = %path,
            entries = plan.total_entries,
            strategy = plan.label(),
            interval = plan.interval(),
            limit = plan.sample_limit(),
            "Analyzing partition"
        );

        let mut acc = Accumulator::new(self.top_k);
        let outcome = match plan.strategy {
            SamplingStrategy::BoundedFetch { limit } => self.fetch(path, limit, &mut acc),
            SamplingStrategy::FullScan { .. } | SamplingStrategy::StrideSample { .. } => {
                self.iterate(path, &plan, &mut acc)
            }
        };

        if let Err(e) = outcome {
            return self.fail(path, plan.total_entries, e.to_string());
        }

        let average = (acc.sampled > 0).then(|| acc.sum as f64 / acc.sampled as f64);
        let summary = PartitionSummary {
            partition_name: path.to_string(),
            total_entries: plan.total_entries,
            sampled_count: acc.sampled,
            top_k: acc.selector.into_result(),
            average_sampled_size_bytes: average,
            status: ScanStatus::Success,
            error_message: None,
            plan: Some(plan),
            estimation_failures: acc.failures,
        };

        recorder::record_samples(summary.sampled_count);
        recorder::record_partition_scanned(plan.label(), "success", started.elapsed());
        debug!(
            partition = %path,
            sampled = summary.sampled_count,
            failures = summary.estimation_failures,
            max_bytes = summary.max_size_bytes().unwrap_or(0),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Partition analyzed"
        );
        summary
    }

    fn iterate(
        &self,
        path: &PartitionPath,
        plan: &SamplingPlan,
        acc: &mut Accumulator,
    ) -> Result<()> {
        let limit = plan.sample_limit();
        let keys = self.host.iterate_keys(path)?;

        for (ordinal, key) in (0u64..).zip(keys) {
            if acc.sampled >= limit {
                break;
            }
            if !plan.should_examine(ordinal) {
                continue;
            }
            // absent values are neither samples nor failures
            if let Some(value) = self.host.get(path, &key) {
                acc.record(self.estimator, path, key, &value);
            }
        }
        Ok(())
    }

    fn fetch(&self, path: &PartitionPath, limit: u64, acc: &mut Accumulator) -> Result<()> {
        let values = self.host.fetch_bounded(path, limit)?;
        debug!(partition = %path, returned = values.len(), "Bounded fetch returned");

        for (ordinal, value) in values.iter().enumerate() {
            if acc.sampled >= limit {
                break;
            }
            acc.record(self.estimator, path, format!("{}#{}", path, ordinal), value);
        }
        Ok(())
    }

    fn fail(&self, path: &PartitionPath, total_entries: u64, message: String) -> PartitionSummary {
        error!(partition = %path, error = %message, "Error analyzing partition");
        recorder::record_partition_scanned("none", "error", std::time::Duration::ZERO);
        PartitionSummary::failed(path.as_str(), total_entries, message)
    }
}
