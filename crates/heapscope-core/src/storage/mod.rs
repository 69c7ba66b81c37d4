//! Host storage seams
//!
//! The profiler never owns cache data. Everything it needs from the hosting
//! cache member (partition enumeration, entry counts, key iteration, point
//! reads and the optional bounded bulk fetch) goes through [`CacheHost`].
//! [`MemoryStore`] is the in-process implementation used by the CLI and
//! the test suite.

pub mod memory;
pub mod snapshot;

pub use memory::{Entry, MemoryStore, Value};
pub use snapshot::{ClusterSnapshot, MemberSnapshot, PartitionSnapshot, SnapshotValue};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProfilerError, Result};

/// Full slash-separated path of a partition, e.g. `/orders/archive`.
///
/// Paths are the partition identity: two references to the same path are
/// the same partition, however they were reached.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionPath(String);

impl PartitionPath {
    /// Separator between path segments.
    pub const SEPARATOR: char = '/';

    /// Build a path, normalizing to a single leading separator and no
    /// trailing one.
    pub fn new(path: impl AsRef<str>) -> Self {
        let trimmed = path.as_ref().trim_matches(Self::SEPARATOR);
        Self(format!("{}{}", Self::SEPARATOR, trimmed))
    }

    /// Path of a child partition.
    pub fn child(&self, name: &str) -> Self {
        Self::new(format!("{}{}{}", self.0, Self::SEPARATOR, name))
    }

    /// Path of the parent partition, `None` for a root partition.
    pub fn parent(&self) -> Option<Self> {
        let idx = self.0.rfind(Self::SEPARATOR)?;
        (idx > 0).then(|| Self(self.0[..idx].to_string()))
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        Self::last_segment(&self.0)
    }

    /// Last segment of a raw slash-separated path.
    pub fn last_segment(path: &str) -> &str {
        path.rsplit(Self::SEPARATOR).next().unwrap_or(path)
    }

    /// Full path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Capabilities a cache member exposes to the profiler.
///
/// Every call may block on I/O or distributed coordination. The data may
/// change concurrently; implementations are not expected to provide a
/// consistent view across calls.
pub trait CacheHost: Send + Sync {
    /// Value type stored in the host's partitions.
    type Value;

    /// Name of this member within the cluster.
    fn member_name(&self) -> String;

    /// Top-level partitions hosted by this member.
    fn root_partitions(&self) -> Result<Vec<PartitionPath>>;

    /// Direct children of a partition.
    fn subpartitions(&self, path: &PartitionPath) -> Vec<PartitionPath>;

    /// Current number of entries in a partition.
    fn entry_count(&self, path: &PartitionPath) -> Result<u64>;

    /// Lazily iterate the keys of a partition.
    fn iterate_keys(&self, path: &PartitionPath)
        -> Result<Box<dyn Iterator<Item = String> + '_>>;

    /// Read one value. `None` when the key is gone or holds no value.
    fn get(&self, path: &PartitionPath, key: &str) -> Option<Self::Value>;

    /// Whether [`CacheHost::fetch_bounded`] is available for this partition.
    fn supports_bounded_fetch(&self, _path: &PartitionPath) -> bool {
        false
    }

    /// Engine-native bulk read of at most `limit` values.
    fn fetch_bounded(&self, path: &PartitionPath, _limit: u64) -> Result<Vec<Self::Value>> {
        Err(ProfilerError::BoundedFetchUnsupported(path.to_string()))
    }
}
