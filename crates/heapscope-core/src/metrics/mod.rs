//! Metrics for heapscope
//!
//! Counters and histograms are emitted through the `metrics` facade. The
//! library never installs an exporter; embedding processes that already run
//! one (Prometheus, OTLP) pick the series up automatically.

pub mod recorder;
