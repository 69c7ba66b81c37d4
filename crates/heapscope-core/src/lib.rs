//! # Heapscope Core
//!
//! Sampling heap profiler for partitioned key/value caches: estimates the
//! largest resident objects per partition and member, and recommends a G1
//! region size that keeps them out of humongous allocation.

// ── Engine ───────────────────────────────────────────────────────────────────

pub mod profiler;
pub mod sizing;
pub mod storage;

// ── Entry points ─────────────────────────────────────────────────────────────

pub mod functions;

// ── Ambient ──────────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod metrics;

// ── Public re-exports ────────────────────────────────────────────────────────

pub use config::Config;
pub use error::{ProfilerError, Result};
