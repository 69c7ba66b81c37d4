//! Sample and top-K result types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes per mebibyte, the unit all thresholds are expressed in.
pub const BYTES_PER_MIB: f64 = 1_048_576.0;

/// Convert a byte count to MiB.
#[inline]
pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// One examined entry: identifier, value type and estimated deep size.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Entry key (or a synthesized ordinal for bulk-fetched values).
    pub identifier: String,
    /// Short type name of the value.
    pub type_name: String,
    /// Estimated resident size in bytes.
    pub size_bytes: u64,
}

impl Sample {
    /// Create a new sample.
    pub fn new(identifier: impl Into<String>, type_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            identifier: identifier.into(),
            type_name: type_name.into(),
            size_bytes,
        }
    }

    /// Size in MiB.
    pub fn size_mib(&self) -> f64 {
        bytes_to_mib(self.size_bytes)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry[key={}, size={} ({:.2} MB)]",
            self.identifier,
            self.size_bytes,
            self.size_mib()
        )
    }
}

/// At most K samples, sorted descending by size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopKSet(Vec<Sample>);

impl TopKSet {
    /// Build from samples already sorted descending by size.
    pub(crate) fn from_sorted(samples: Vec<Sample>) -> Self {
        debug_assert!(samples
            .windows(2)
            .all(|w| w[0].size_bytes >= w[1].size_bytes));
        Self(samples)
    }

    /// The largest retained sample.
    pub fn largest(&self) -> Option<&Sample> {
        self.0.first()
    }

    /// Size of the largest retained sample, if any.
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.largest().map(|s| s.size_bytes)
    }

    /// Sum of all retained sizes.
    pub fn total_size_bytes(&self) -> u64 {
        self.0.iter().map(|s| s.size_bytes).sum()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was retained.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate largest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.0.iter()
    }

    /// Retained sizes, largest first.
    pub fn sizes(&self) -> Vec<u64> {
        self.0.iter().map(|s| s.size_bytes).collect()
    }

    /// Consume into the underlying descending vector.
    pub fn into_vec(self) -> Vec<Sample> {
        self.0
    }
}

impl<'a> IntoIterator for &'a TopKSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
