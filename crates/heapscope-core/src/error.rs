//! Error types for heapscope
//!
//! This module defines all error types used by the profiling engine.
//! Uses `thiserror` for ergonomic error definitions.

use std::io;
use thiserror::Error;

/// Main error type for profiling operations
#[derive(Error, Debug)]
pub enum ProfilerError {
    /// Size estimation failed for a single entry
    #[error("Estimation error: {0}")]
    Estimation(String),

    /// Establishing or running a partition's iteration plan failed
    #[error("Partition scan error: {0}")]
    PartitionScan(String),

    /// Partition path does not exist on this member
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// Host does not offer an engine-native bounded fetch for the partition
    #[error("Bounded fetch not supported for partition {0}")]
    BoundedFetchUnsupported(String),

    /// Partitions hosted by a member could not be enumerated
    #[error("Enumeration error: {0}")]
    Enumeration(String),

    /// Snapshot file could not be parsed or loaded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument value or format
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

impl ProfilerError {
    /// Returns true if the failure is confined to a single entry and the
    /// surrounding scan may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProfilerError::Estimation(_))
    }
}
