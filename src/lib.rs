//! # Heapscope
//!
//! Sampled per-entry memory profiling for partitioned caches, with G1 region
//! size recommendations derived from the largest resident objects.
//!
//! This is the top-level crate that re-exports `heapscope-core` for a unified
//! API and hosts the `heapscope` command-line tool.
//!
//! ## Quick start
//!
//! ```
//! use heapscope::profiler::{NodeReporter, SamplingEngine};
//! use heapscope::sizing::DeepSizer;
//! use heapscope::storage::{MemoryStore, PartitionPath, Value};
//!
//! let store = MemoryStore::new("server-1");
//! store.put(&PartitionPath::new("/orders"), "o:1", Value::String("hello".into()));
//!
//! let sizer = DeepSizer::new();
//! let report = NodeReporter::new(&store, &sizer, SamplingEngine::default(), 10).analyze();
//! assert_eq!(report.recommendation.region_size_label.as_str(), "16M");
//! ```

// ── Re-exports from heapscope-core ───────────────────────────────────────────

pub use heapscope_core::config;
pub use heapscope_core::error;
pub use heapscope_core::functions;
pub use heapscope_core::metrics;
pub use heapscope_core::profiler;
pub use heapscope_core::sizing;
pub use heapscope_core::storage;

pub use heapscope_core::{Config, ProfilerError, Result};
