//! Per-member analysis
//!
//! Walks every partition reachable from a member's roots, scanning each one
//! exactly once, and rolls the results into a [`NodeReport`].

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::recommend::{Recommendation, Recommender};
use super::sample::{bytes_to_mib, Sample};
use super::sampling::SamplingEngine;
use super::scanner::{PartitionScanner, PartitionSummary, ScanStatus};
use crate::metrics::recorder;
use crate::sizing::SizeEstimator;
use crate::storage::{CacheHost, PartitionPath};

/// One member's analysis result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Member that produced the report.
    pub member_name: String,
    /// Summaries in visit order (depth-first, roots in host order).
    pub partition_summaries: Vec<PartitionSummary>,
    /// Largest sample over all partitions, 0 when nothing was sampled.
    pub overall_max_size_bytes: u64,
    /// Recommendation for `overall_max_size_bytes`.
    pub recommendation: Recommendation,
    /// Set when the member could not be analyzed at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeReport {
    /// Report for a member whose analysis failed outright.
    pub fn failed(member_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            member_name: member_name.into(),
            partition_summaries: Vec::new(),
            overall_max_size_bytes: 0,
            recommendation: Recommender::recommend(0),
            error: Some(message.into()),
        }
    }

    /// Whether the member-level analysis failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Largest size in MiB.
    pub fn overall_max_size_mib(&self) -> f64 {
        bytes_to_mib(self.overall_max_size_bytes)
    }

    /// The largest sample and the partition holding it.
    pub fn largest(&self) -> Option<(&PartitionSummary, &Sample)> {
        self.partition_summaries
            .iter()
            .filter_map(|s| s.top_k.largest().map(|largest| (s, largest)))
            .max_by_key(|(_, sample)| sample.size_bytes)
    }

    /// Summaries that ended in [`ScanStatus::Error`].
    pub fn failed_partitions(&self) -> impl Iterator<Item = &PartitionSummary> {
        self.partition_summaries
            .iter()
            .filter(|s| s.status == ScanStatus::Error)
    }

    /// Total entries counted across all partitions.
    pub fn total_entries(&self) -> u64 {
        self.partition_summaries.iter().map(|s| s.total_entries).sum()
    }

    /// Total samples collected across all partitions.
    pub fn total_sampled(&self) -> u64 {
        self.partition_summaries.iter().map(|s| s.sampled_count).sum()
    }
}

/// Runs a [`PartitionScanner`] over every partition of one member.
pub struct NodeReporter<'a, H: CacheHost, E: ?Sized> {
    host: &'a H,
    scanner: PartitionScanner<'a, H, E>,
}

impl<'a, H, E> NodeReporter<'a, H, E>
where
    H: CacheHost,
    E: SizeEstimator<H::Value> + ?Sized,
{
    /// Create a reporter for `host`.
    pub fn new(host: &'a H, estimator: &'a E, engine: SamplingEngine, top_k: usize) -> Self {
        Self {
            host,
            scanner: PartitionScanner::new(host, estimator, engine, top_k),
        }
    }

    /// Analyze every partition of the member.
    ///
    /// Never fails: a member whose partitions cannot be enumerated yields an
    /// error report instead.
    pub fn analyze(&self) -> NodeReport {
        let started = Instant::now();
        let member = self.host.member_name();
        info!(member = %member, "Analyzing member");

        let partitions = match self.collect_partitions() {
            Ok(partitions) => partitions,
            Err(e) => {
                error!(member = %member, error = %e, "Failed to enumerate partitions");
                recorder::record_node_report(&member, 0, true);
                return NodeReport::failed(member, e.to_string());
            }
        };

        let partition_summaries: Vec<PartitionSummary> = partitions
            .iter()
            .map(|path| self.scanner.scan(path))
            .collect();

        let overall_max_size_bytes = partition_summaries
            .iter()
            .filter_map(PartitionSummary::max_size_bytes)
            .max()
            .unwrap_or(0);
        let recommendation = Recommender::recommend(overall_max_size_bytes);

        if recommendation.region_size_label.is_warning() {
            warn!(
                member = %member,
                max_bytes = overall_max_size_bytes,
                "Largest object will be humongous even with 32MB regions"
            );
        }
        info!(
            member = %member,
            partitions = partition_summaries.len(),
            max_bytes = overall_max_size_bytes,
            recommendation = %recommendation.region_size_label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Member analysis complete"
        );
        recorder::record_node_report(&member, overall_max_size_bytes, false);

        NodeReport {
            member_name: member,
            partition_summaries,
            overall_max_size_bytes,
            recommendation,
            error: None,
        }
    }

    /// Depth-first list of reachable partitions, each path at most once.
    fn collect_partitions(&self) -> crate::error::Result<Vec<PartitionPath>> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        let mut stack: Vec<PartitionPath> = self.host.root_partitions()?;
        stack.reverse();

        while let Some(path) = stack.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let mut children = self.host.subpartitions(&path);
            children.reverse();
            stack.extend(children);
            ordered.push(path);
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::error::{ProfilerError, Result};
    use crate::profiler::recommend::RegionSizeLabel;
    use crate::sizing::DeepSizer;
    use crate::storage::{MemoryStore, Value};
    use bytes::Bytes;

    const MIB: usize = 1_048_576;

    fn blob(len: usize) -> Value {
        Value::String(Bytes::from(vec![0u8; len]))
    }

    fn reporter<'a, H: CacheHost<Value = Value>>(
        host: &'a H,
        sizer: &'a DeepSizer,
    ) -> NodeReporter<'a, H, DeepSizer> {
        NodeReporter::new(host, sizer, SamplingEngine::new(SamplingConfig::deep()), 10)
    }

    #[test]
    fn test_walks_nested_partitions() {
        let store = MemoryStore::new("server-1");
        store.put(&PartitionPath::new("/orders"), "o:1", blob(100));
        store.put(&PartitionPath::new("/orders/archive"), "a:1", blob(9 * MIB));
        store.create_partition(&PartitionPath::new("/empty"));

        let sizer = DeepSizer::new();
        let report = reporter(&store, &sizer).analyze();

        let names: Vec<&str> = report
            .partition_summaries
            .iter()
            .map(|s| s.partition_name.as_str())
            .collect();
        assert_eq!(names, vec!["/empty", "/orders", "/orders/archive"]);
        assert_eq!(report.partition_summaries[0].status, ScanStatus::Empty);
        assert_eq!(report.overall_max_size_bytes, 9 * MIB as u64 + 32);
        assert_eq!(
            report.recommendation.region_size_label,
            RegionSizeLabel::Region32M
        );
        let (partition, sample) = report.largest().unwrap();
        assert_eq!(partition.partition_name, "/orders/archive");
        assert_eq!(sample.identifier, "a:1");
    }

    #[test]
    fn test_empty_member() {
        let store = MemoryStore::new("server-1");
        let sizer = DeepSizer::new();
        let report = reporter(&store, &sizer).analyze();
        assert!(report.partition_summaries.is_empty());
        assert_eq!(report.overall_max_size_bytes, 0);
        assert_eq!(
            report.recommendation.region_size_label,
            RegionSizeLabel::Region16M
        );
        assert!(!report.is_error());
    }

    /// Host whose partition graph reaches `/shared` twice and whose
    /// `/broken` partition cannot be counted.
    struct DiamondHost {
        inner: MemoryStore,
    }

    impl CacheHost for DiamondHost {
        type Value = Value;

        fn member_name(&self) -> String {
            "diamond".to_string()
        }

        fn root_partitions(&self) -> Result<Vec<PartitionPath>> {
            Ok(vec![
                PartitionPath::new("/a"),
                PartitionPath::new("/b"),
                PartitionPath::new("/broken"),
            ])
        }

        fn subpartitions(&self, path: &PartitionPath) -> Vec<PartitionPath> {
            match path.as_str() {
                "/a" | "/b" => vec![PartitionPath::new("/shared")],
                _ => Vec::new(),
            }
        }

        fn entry_count(&self, path: &PartitionPath) -> Result<u64> {
            if path.as_str() == "/broken" {
                return Err(ProfilerError::PartitionScan("region destroyed".to_string()));
            }
            self.inner.entry_count(path)
        }

        fn iterate_keys(
            &self,
            path: &PartitionPath,
        ) -> Result<Box<dyn Iterator<Item = String> + '_>> {
            self.inner.iterate_keys(path)
        }

        fn get(&self, path: &PartitionPath, key: &str) -> Option<Value> {
            self.inner.get(path, key)
        }
    }

    #[test]
    fn test_dedups_and_isolates_failures() {
        let inner = MemoryStore::new("diamond");
        for name in ["/a", "/b", "/shared"] {
            inner.put(&PartitionPath::new(name), "k", blob(10));
        }
        let host = DiamondHost { inner };
        let sizer = DeepSizer::new();
        let report = reporter(&host, &sizer).analyze();

        let names: Vec<&str> = report
            .partition_summaries
            .iter()
            .map(|s| s.partition_name.as_str())
            .collect();
        assert_eq!(names, vec!["/a", "/shared", "/b", "/broken"]);
        assert_eq!(report.failed_partitions().count(), 1);
        assert_eq!(report.overall_max_size_bytes, 42);
        assert!(!report.is_error());
    }

    /// Host whose reads fail after the entry count succeeds: `/big` offers a
    /// bulk read that errors, `/keyless` cannot list its keys.
    struct FlakyReadHost {
        inner: MemoryStore,
    }

    impl CacheHost for FlakyReadHost {
        type Value = Value;

        fn member_name(&self) -> String {
            "flaky".to_string()
        }

        fn root_partitions(&self) -> Result<Vec<PartitionPath>> {
            self.inner.root_partitions()
        }

        fn subpartitions(&self, path: &PartitionPath) -> Vec<PartitionPath> {
            self.inner.subpartitions(path)
        }

        fn entry_count(&self, path: &PartitionPath) -> Result<u64> {
            self.inner.entry_count(path)
        }

        fn iterate_keys(
            &self,
            path: &PartitionPath,
        ) -> Result<Box<dyn Iterator<Item = String> + '_>> {
            if path.as_str() == "/keyless" {
                return Err(ProfilerError::PartitionScan("keyset failed".to_string()));
            }
            self.inner.iterate_keys(path)
        }

        fn get(&self, path: &PartitionPath, key: &str) -> Option<Value> {
            self.inner.get(path, key)
        }

        fn supports_bounded_fetch(&self, path: &PartitionPath) -> bool {
            path.as_str() == "/big"
        }

        fn fetch_bounded(&self, _path: &PartitionPath, _limit: u64) -> Result<Vec<Value>> {
            Err(ProfilerError::PartitionScan("query failed".to_string()))
        }
    }

    #[test]
    fn test_read_failures_after_count_isolate_partition() {
        let inner = MemoryStore::new("flaky");
        let payload = blob(16);
        for i in 0..20_000 {
            inner.put(&PartitionPath::new("/big"), format!("b:{i:05}"), payload.clone());
        }
        inner.put(&PartitionPath::new("/keyless"), "k", blob(64));
        inner.put(&PartitionPath::new("/ok"), "k", blob(100));

        let host = FlakyReadHost { inner };
        let sizer = DeepSizer::new();
        let report = reporter(&host, &sizer).analyze();

        let outcome: Vec<(&str, ScanStatus)> = report
            .partition_summaries
            .iter()
            .map(|s| (s.partition_name.as_str(), s.status))
            .collect();
        assert_eq!(
            outcome,
            vec![
                ("/big", ScanStatus::Error),
                ("/keyless", ScanStatus::Error),
                ("/ok", ScanStatus::Success),
            ]
        );

        let big = &report.partition_summaries[0];
        assert_eq!(big.total_entries, 20_000);
        assert!(big
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("query failed")));
        assert!(report.partition_summaries[1]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("keyset failed")));
        assert_eq!(report.partition_summaries[2].error_message, None);

        assert_eq!(report.failed_partitions().count(), 2);
        assert_eq!(report.overall_max_size_bytes, 132);
        assert!(!report.is_error());
    }

    struct UnreachableHost;

    impl CacheHost for UnreachableHost {
        type Value = Value;

        fn member_name(&self) -> String {
            "gone".to_string()
        }

        fn root_partitions(&self) -> Result<Vec<PartitionPath>> {
            Err(ProfilerError::Enumeration("cache closed".to_string()))
        }

        fn subpartitions(&self, _path: &PartitionPath) -> Vec<PartitionPath> {
            Vec::new()
        }

        fn entry_count(&self, _path: &PartitionPath) -> Result<u64> {
            Ok(0)
        }

        fn iterate_keys(
            &self,
            _path: &PartitionPath,
        ) -> Result<Box<dyn Iterator<Item = String> + '_>> {
            Ok(Box::new(std::iter::empty()))
        }

        fn get(&self, _path: &PartitionPath, _key: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn test_enumeration_failure_yields_error_report() {
        let sizer = DeepSizer::new();
        let report = reporter(&UnreachableHost, &sizer).analyze();
        assert!(report.is_error());
        assert!(report.error.unwrap().contains("cache closed"));
        assert_eq!(report.overall_max_size_bytes, 0);
    }
}
