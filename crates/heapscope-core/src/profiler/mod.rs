//! Heap profiling engine
//!
//! Partition scanning, bounded top-K selection, per-member reporting and the
//! cluster roll-up that produces a G1 region size recommendation.
//!
//! Data flows one way:
//!
//! ```text
//! PartitionScanner -> SamplingEngine -> SizeEstimator -> TopKSelector
//!     -> PartitionSummary -> NodeReporter -> Recommender -> Aggregator
//! ```

pub mod aggregate;
pub mod node;
pub mod recommend;
pub mod report;
pub mod sample;
pub mod sampling;
pub mod scanner;
pub mod topk;

pub use aggregate::{Aggregator, ClusterReport, ClusterRunner};
pub use node::{NodeReport, NodeReporter};
pub use recommend::{Recommendation, RegionSizeLabel, Recommender};
pub use sample::{bytes_to_mib, Sample, TopKSet, BYTES_PER_MIB};
pub use sampling::{SamplingEngine, SamplingPlan, SamplingStrategy};
pub use scanner::{PartitionScanner, PartitionSummary, ScanStatus};
pub use topk::TopKSelector;
