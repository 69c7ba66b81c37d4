//! Cluster-wide aggregation
//!
//! Each member is analyzed in isolation and produces an immutable
//! [`NodeReport`]; [`Aggregator::merge`] reduces those reports to a single
//! [`ClusterReport`]. [`ClusterRunner`] drives the per-member passes as
//! independent blocking tasks and hands their one-shot results to the
//! reduction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::node::{NodeReport, NodeReporter};
use super::recommend::{Recommendation, Recommender};
use super::sample::bytes_to_mib;
use super::sampling::SamplingEngine;
use crate::error::Result;
use crate::metrics::recorder;
use crate::sizing::SizeEstimator;
use crate::storage::CacheHost;

/// Roll-up of every member's report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    /// Member reports in input order.
    pub node_reports: Vec<NodeReport>,
    /// Largest size over all members.
    pub cluster_max_size_bytes: u64,
    /// Member holding the largest object, if any object was sampled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_member: Option<String>,
    /// Recommendation for `cluster_max_size_bytes`.
    pub recommendation: Recommendation,
}

impl ClusterReport {
    /// Cluster maximum in MiB.
    pub fn cluster_max_size_mib(&self) -> f64 {
        bytes_to_mib(self.cluster_max_size_bytes)
    }

    /// Members whose analysis failed outright.
    pub fn failed_members(&self) -> impl Iterator<Item = &NodeReport> {
        self.node_reports.iter().filter(|r| r.is_error())
    }
}

/// Reduces member reports into a [`ClusterReport`].
pub struct Aggregator;

impl Aggregator {
    /// Merge member reports.
    ///
    /// The maximum, its member and the recommendation do not depend on
    /// input order; ties on the maximum go to the lexically first member.
    pub fn merge(node_reports: Vec<NodeReport>) -> ClusterReport {
        let largest = node_reports
            .iter()
            .filter(|r| r.overall_max_size_bytes > 0)
            .min_by(|a, b| {
                b.overall_max_size_bytes
                    .cmp(&a.overall_max_size_bytes)
                    .then_with(|| a.member_name.cmp(&b.member_name))
            });

        let cluster_max_size_bytes = largest.map_or(0, |r| r.overall_max_size_bytes);
        let largest_member = largest.map(|r| r.member_name.clone());

        ClusterReport {
            recommendation: Recommender::recommend(cluster_max_size_bytes),
            cluster_max_size_bytes,
            largest_member,
            node_reports,
        }
    }
}

/// Analyzes several members concurrently and merges the results.
pub struct ClusterRunner<E: ?Sized> {
    estimator: Arc<E>,
    engine: SamplingEngine,
    top_k: usize,
    node_timeout: Option<Duration>,
}

impl<E: ?Sized> ClusterRunner<E> {
    /// Create a runner sharing `estimator` across members.
    pub fn new(estimator: Arc<E>, engine: SamplingEngine, top_k: usize) -> Self {
        Self {
            estimator,
            engine,
            top_k,
            node_timeout: None,
        }
    }

    /// Give up on a member after `timeout`; `None` waits indefinitely.
    ///
    /// A timed-out member's blocking task cannot be cancelled and keeps
    /// running. A runtime dropped normally waits for it; use
    /// [`ClusterRunner::run_blocking`] to return without waiting.
    pub fn with_node_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.node_timeout = timeout;
        self
    }

    /// Analyze every host and merge the reports, preserving host order.
    ///
    /// A member task that panics or exceeds the node timeout contributes an
    /// error report; the run itself always completes.
    pub async fn run<H>(&self, hosts: Vec<Arc<H>>) -> ClusterReport
    where
        H: CacheHost + 'static,
        E: SizeEstimator<H::Value> + 'static,
    {
        let started = Instant::now();
        info!(members = hosts.len(), "Starting cluster analysis");

        let tasks: Vec<(String, JoinHandle<NodeReport>)> = hosts
            .into_iter()
            .map(|host| {
                let member = host.member_name();
                let estimator = Arc::clone(&self.estimator);
                let engine = self.engine.clone();
                let top_k = self.top_k;
                let handle = tokio::task::spawn_blocking(move || {
                    NodeReporter::new(host.as_ref(), estimator.as_ref(), engine, top_k).analyze()
                });
                (member, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (member, handle) in tasks {
            reports.push(self.collect(member, handle).await);
        }

        let report = Aggregator::merge(reports);
        info!(
            members = report.node_reports.len(),
            max_bytes = report.cluster_max_size_bytes,
            recommendation = %report.recommendation.region_size_label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cluster analysis complete"
        );
        report
    }

    /// Run on a dedicated runtime and return as soon as the report is ready.
    ///
    /// The runtime is shut down in the background, so member tasks left
    /// behind by a timeout do not delay the caller.
    pub fn run_blocking<H>(&self, hosts: Vec<Arc<H>>) -> Result<ClusterReport>
    where
        H: CacheHost + 'static,
        E: SizeEstimator<H::Value> + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("heapscope-cluster")
            .build()?;
        let report = runtime.block_on(self.run(hosts));
        runtime.shutdown_background();
        Ok(report)
    }

    async fn collect(&self, member: String, handle: JoinHandle<NodeReport>) -> NodeReport {
        let joined = match self.node_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    error!(
                        member = %member,
                        timeout_ms = timeout.as_millis() as u64,
                        "Member analysis timed out"
                    );
                    recorder::record_node_report(&member, 0, true);
                    return NodeReport::failed(
                        member,
                        format!("analysis timed out after {:?}", timeout),
                    );
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(report) => report,
            Err(e) => {
                error!(member = %member, error = %e, "Member analysis task failed");
                recorder::record_node_report(&member, 0, true);
                NodeReport::failed(member, format!("analysis task failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::profiler::recommend::RegionSizeLabel;
    use crate::sizing::{DeepSizer, FnEstimator};
    use crate::storage::{MemoryStore, PartitionPath, Value};
    use bytes::Bytes;

    const MIB: u64 = 1_048_576;

    fn node(member: &str, max: u64) -> NodeReport {
        NodeReport {
            member_name: member.to_string(),
            partition_summaries: Vec::new(),
            overall_max_size_bytes: max,
            recommendation: Recommender::recommend(max),
            error: None,
        }
    }

    #[test]
    fn test_merge_takes_cluster_max() {
        let report = Aggregator::merge(vec![
            node("a", 2 * MIB),
            node("b", 20 * MIB),
            node("c", 9 * MIB),
        ]);
        assert_eq!(report.cluster_max_size_bytes, 20 * MIB);
        assert_eq!(report.largest_member.as_deref(), Some("b"));
        assert_eq!(
            report.recommendation.region_size_label,
            RegionSizeLabel::Region32MWithWarning
        );
        let members: Vec<&str> = report
            .node_reports
            .iter()
            .map(|r| r.member_name.as_str())
            .collect();
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let forward = Aggregator::merge(vec![node("a", 5), node("b", 7), node("c", 7)]);
        let reverse = Aggregator::merge(vec![node("c", 7), node("b", 7), node("a", 5)]);
        assert_eq!(forward.cluster_max_size_bytes, reverse.cluster_max_size_bytes);
        assert_eq!(forward.largest_member, reverse.largest_member);
        assert_eq!(forward.recommendation, reverse.recommendation);
        assert_eq!(forward.largest_member.as_deref(), Some("b"));
    }

    #[test]
    fn test_merge_empty() {
        let report = Aggregator::merge(Vec::new());
        assert_eq!(report.cluster_max_size_bytes, 0);
        assert!(report.largest_member.is_none());
        assert_eq!(
            report.recommendation.region_size_label,
            RegionSizeLabel::Region16M
        );
    }

    fn store(member: &str, size: usize) -> Arc<MemoryStore> {
        let store = MemoryStore::new(member);
        store.put(
            &PartitionPath::new("/data"),
            "k",
            Value::String(Bytes::from(vec![0u8; size])),
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_runner_merges_members_in_order() {
        let runner = ClusterRunner::new(
            Arc::new(DeepSizer::new()),
            SamplingEngine::new(SamplingConfig::quick()),
            5,
        );
        let report = runner
            .run(vec![store("m1", 100), store("m2", 10 * MIB as usize), store("m3", 50)])
            .await;

        let members: Vec<&str> = report
            .node_reports
            .iter()
            .map(|r| r.member_name.as_str())
            .collect();
        assert_eq!(members, vec!["m1", "m2", "m3"]);
        assert_eq!(report.largest_member.as_deref(), Some("m2"));
        assert_eq!(
            report.recommendation.region_size_label,
            RegionSizeLabel::Region32M
        );
    }

    #[tokio::test]
    async fn test_runner_converts_panic_into_error_report() {
        let estimator = FnEstimator::new(|value: &Value| -> Result<u64> {
            match value {
                Value::String(b) if b.len() == 13 => panic!("sizer blew up"),
                Value::String(b) => Ok(b.len() as u64),
                _ => Ok(0),
            }
        });
        let runner = ClusterRunner::new(
            Arc::new(estimator),
            SamplingEngine::new(SamplingConfig::quick()),
            5,
        );
        let report = runner.run(vec![store("ok", 100), store("bad", 13)]).await;

        assert_eq!(report.node_reports.len(), 2);
        assert!(!report.node_reports[0].is_error());
        assert!(report.node_reports[1].is_error());
        assert_eq!(report.failed_members().count(), 1);
        assert_eq!(report.cluster_max_size_bytes, 100);
    }

    /// Member whose partition listing stalls for `delay`.
    struct StalledHost {
        inner: MemoryStore,
        delay: Duration,
    }

    impl CacheHost for StalledHost {
        type Value = Value;

        fn member_name(&self) -> String {
            self.inner.member_name()
        }

        fn root_partitions(&self) -> Result<Vec<PartitionPath>> {
            std::thread::sleep(self.delay);
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
            self.inner.iterate_keys(path)
        }

        fn get(&self, path: &PartitionPath, key: &str) -> Option<Value> {
            self.inner.get(path, key)
        }
    }

    fn stalled(member: &str, delay: Duration) -> Arc<StalledHost> {
        let inner = MemoryStore::new(member);
        inner.put(
            &PartitionPath::new("/data"),
            "k",
            Value::String(Bytes::from(vec![0u8; 100])),
        );
        Arc::new(StalledHost { inner, delay })
    }

    #[test]
    fn test_run_blocking_does_not_wait_for_timed_out_members() {
        let runner = ClusterRunner::new(
            Arc::new(DeepSizer::new()),
            SamplingEngine::new(SamplingConfig::quick()),
            5,
        )
        .with_node_timeout(Some(Duration::from_millis(50)));

        let started = Instant::now();
        let report = runner
            .run_blocking(vec![
                stalled("fast", Duration::ZERO),
                stalled("slow", Duration::from_secs(3)),
            ])
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!report.node_reports[0].is_error());
        assert!(report.node_reports[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")));
        assert_eq!(report.cluster_max_size_bytes, 132);
    }
}
