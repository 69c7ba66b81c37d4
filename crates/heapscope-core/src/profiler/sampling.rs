//! Sampling strategy selection
//!
//! Decides, once per partition and from static parameters only, how the
//! scanner visits entries:
//!
//! - small partitions are walked in iteration order up to a fixed cap,
//! - large partitions use the host's bounded bulk fetch when it has one,
//! - otherwise large partitions are stride-sampled so the budget is spread
//!   over the whole key space instead of its head.

use serde::{Deserialize, Serialize};

use crate::config::SamplingConfig;

/// How a partition's entries are visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Examine entries in iteration order until `cap` samples are taken.
    FullScan {
        /// Maximum samples.
        cap: u64,
    },
    /// Examine every `interval`-th entry until `budget` samples are taken.
    StrideSample {
        /// Distance between examined ordinals.
        interval: u64,
        /// Maximum samples.
        budget: u64,
    },
    /// Ask the host for at most `limit` values in one bulk read.
    BoundedFetch {
        /// Maximum values requested.
        limit: u64,
    },
}

/// The strategy chosen for one partition, with the count it was based on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    /// Entry count observed when the plan was made; may be stale.
    pub total_entries: u64,
    /// Chosen strategy.
    #[serde(flatten)]
    pub strategy: SamplingStrategy,
}

impl SamplingPlan {
    /// Distance between examined ordinals (1 unless stride sampling).
    pub fn interval(&self) -> u64 {
        match self.strategy {
            SamplingStrategy::StrideSample { interval, .. } => interval,
            SamplingStrategy::FullScan { .. } | SamplingStrategy::BoundedFetch { .. } => 1,
        }
    }

    /// Maximum number of samples this plan may collect.
    pub fn sample_limit(&self) -> u64 {
        match self.strategy {
            SamplingStrategy::FullScan { cap } => cap,
            SamplingStrategy::StrideSample { budget, .. } => budget,
            SamplingStrategy::BoundedFetch { limit } => limit,
        }
    }

    /// Whether the entry at iteration `ordinal` should be examined.
    #[inline]
    pub fn should_examine(&self, ordinal: u64) -> bool {
        ordinal % self.interval() == 0
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self.strategy {
            SamplingStrategy::FullScan { .. } => "full-scan",
            SamplingStrategy::StrideSample { .. } => "stride-sample",
            SamplingStrategy::BoundedFetch { .. } => "bounded-fetch",
        }
    }
}

/// Chooses a [`SamplingPlan`] per partition.
#[derive(Clone, Debug, Default)]
pub struct SamplingEngine {
    config: SamplingConfig,
}

impl SamplingEngine {
    /// Create an engine from sampling configuration.
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Stride that spreads `budget` samples over `total_entries`.
    pub fn stride_interval(total_entries: u64, budget: u64) -> u64 {
        (total_entries / budget.max(1)).max(1)
    }

    /// Plan a scan of a partition holding `total_entries` entries.
    ///
    /// `bounded_fetch_available` reports whether the host offers a bulk read
    /// for this partition.
    pub fn plan(&self, total_entries: u64, bounded_fetch_available: bool) -> SamplingPlan {
        let budget = self.config.target_sample_budget.max(1);

        let strategy = if total_entries <= self.config.small_partition_threshold {
            SamplingStrategy::FullScan {
                cap: self.config.small_partition_cap.min(budget),
            }
        } else if bounded_fetch_available && self.config.prefer_bounded_fetch {
            SamplingStrategy::BoundedFetch { limit: budget }
        } else {
            SamplingStrategy::StrideSample {
                interval: Self::stride_interval(total_entries, budget),
                budget,
            }
        };

        SamplingPlan {
            total_entries,
            strategy,
        }
    }

    /// Plan an exhaustive scan: every entry, no cap.
    pub fn exhaustive(total_entries: u64) -> SamplingPlan {
        SamplingPlan {
            total_entries,
            strategy: SamplingStrategy::FullScan { cap: u64::MAX },
        }
    }
}
