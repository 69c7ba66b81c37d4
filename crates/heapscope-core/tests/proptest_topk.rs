//! Property-based tests for top-K selection, sampling plans and
//! recommendations.
//!
//! These tests verify invariants that must hold for any input stream,
//! partition size or sample budget.

use bytes::Bytes;
use proptest::prelude::*;

use heapscope_core::config::SamplingConfig;
use heapscope_core::profiler::{
    PartitionScanner, RegionSizeLabel, Recommender, Sample, SamplingEngine, SamplingStrategy,
    ScanStatus, TopKSelector,
};
use heapscope_core::sizing::DeepSizer;
use heapscope_core::storage::{MemoryStore, PartitionPath, Value};

// ============================================================================
// Test Strategies
// ============================================================================

/// Strategy: a stream of sample sizes with plenty of duplicates
fn sizes_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(prop_oneof![0u64..64, 0u64..10_000_000], 0..300)
}

fn tier(label: RegionSizeLabel) -> u8 {
    match label {
        RegionSizeLabel::Region16M => 0,
        RegionSizeLabel::Region32M => 1,
        RegionSizeLabel::Region32MWithWarning => 2,
    }
}

// ============================================================================
// TopKSelector Property Tests
// ============================================================================

proptest! {
    /// The result holds exactly the min(K, n) largest sizes, descending.
    #[test]
    fn prop_topk_keeps_largest(k in 0usize..20, sizes in sizes_strategy()) {
        let mut selector = TopKSelector::new(k);
        for (i, size) in sizes.iter().enumerate() {
            selector.offer(Sample::new(format!("k{i}"), "String", *size));
        }
        let result = selector.result();

        prop_assert_eq!(result.len(), k.min(sizes.len()));
        let got = result.sizes();
        prop_assert!(got.windows(2).all(|w| w[0] >= w[1]));

        let mut expected = sizes.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected.truncate(k);
        prop_assert_eq!(got, expected);
    }

    /// Identifiers in the result are unique when offered identifiers are.
    #[test]
    fn prop_topk_unique_identifiers(k in 1usize..10, sizes in sizes_strategy()) {
        let mut selector = TopKSelector::new(k);
        for (i, size) in sizes.iter().enumerate() {
            selector.offer(Sample::new(format!("k{i}"), "String", *size));
        }
        let mut ids: Vec<String> = selector
            .into_result()
            .into_vec()
            .into_iter()
            .map(|s| s.identifier)
            .collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
    }
}

// ============================================================================
// Recommender Property Tests
// ============================================================================

proptest! {
    /// Re-running a recommendation yields the same result.
    #[test]
    fn prop_recommend_idempotent(size in any::<u64>()) {
        prop_assert_eq!(Recommender::recommend(size), Recommender::recommend(size));
    }

    /// A larger object never gets a smaller region recommendation.
    #[test]
    fn prop_recommend_monotonic(a in any::<u64>(), b in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            tier(Recommender::recommend(lo).region_size_label)
                <= tier(Recommender::recommend(hi).region_size_label)
        );
    }
}

// ============================================================================
// Sampling Property Tests
// ============================================================================

proptest! {
    /// Plans never exceed the budget, and strides cover the whole partition.
    #[test]
    fn prop_plan_respects_budget(
        total in 0u64..50_000_000,
        budget in 1u64..200_000,
        bulk in any::<bool>(),
    ) {
        let engine = SamplingEngine::new(SamplingConfig {
            target_sample_budget: budget,
            ..SamplingConfig::deep()
        });
        let plan = engine.plan(total, bulk);
        prop_assert!(plan.sample_limit() <= budget);
        prop_assert!(plan.interval() >= 1);

        if let SamplingStrategy::StrideSample { interval, .. } = plan.strategy {
            prop_assert!(interval * budget <= total.max(budget));
            prop_assert!(total / interval >= budget.min(total));
        }
    }

    /// A scan never samples more than its plan allows or the partition holds.
    #[test]
    fn prop_scan_bounded(
        count in 0usize..400,
        budget in 1u64..150,
        holes in prop::collection::vec(any::<bool>(), 400),
    ) {
        let store = MemoryStore::new("prop");
        let path = PartitionPath::new("/p");
        store.create_partition(&path);
        let mut present = 0u64;
        for i in 0..count {
            if holes[i] {
                store.invalidate(&path, format!("k{i:04}"));
            } else {
                store.put(&path, format!("k{i:04}"), Value::String(Bytes::from(vec![0u8; i])));
                present += 1;
            }
        }

        let engine = SamplingEngine::new(SamplingConfig {
            target_sample_budget: budget,
            ..SamplingConfig::deep()
        });
        let sizer = DeepSizer::new();
        let summary = PartitionScanner::new(&store, &sizer, engine, 5).scan(&path);

        if count == 0 {
            prop_assert_eq!(summary.status, ScanStatus::Empty);
        } else {
            prop_assert_eq!(summary.status, ScanStatus::Success);
            let limit = summary.plan.map(|p| p.sample_limit()).unwrap_or(0);
            prop_assert!(summary.sampled_count <= limit);
            prop_assert!(summary.sampled_count <= present);
            prop_assert_eq!(summary.average_sampled_size_bytes.is_some(), summary.sampled_count > 0);
        }
    }
}
