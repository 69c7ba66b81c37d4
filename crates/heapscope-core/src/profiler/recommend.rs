//! G1 region size recommendation.
//!
//! A G1 object is humongous once it reaches half a region. With the default
//! 16 MiB ceiling for auto-sized regions that means anything at or above
//! 8 MiB needs 32 MiB regions, and anything at or above 16 MiB stays
//! humongous even then.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::sample::bytes_to_mib;

/// Largest objects below this many MiB fit 16 MiB regions.
pub const SMALL_REGION_LIMIT_MIB: f64 = 8.0;

/// Objects at or above this many MiB are humongous with 32 MiB regions.
pub const HUMONGOUS_LIMIT_MIB: f64 = 16.0;

/// Recommended `-XX:G1HeapRegionSize` setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionSizeLabel {
    /// 16 MiB regions.
    #[serde(rename = "16M")]
    Region16M,
    /// 32 MiB regions.
    #[serde(rename = "32M")]
    Region32M,
    /// 32 MiB regions, but the largest objects will still be humongous.
    #[serde(rename = "32M_WITH_WARNING")]
    Region32MWithWarning,
}

impl RegionSizeLabel {
    /// Label as reported.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionSizeLabel::Region16M => "16M",
            RegionSizeLabel::Region32M => "32M",
            RegionSizeLabel::Region32MWithWarning => "32M_WITH_WARNING",
        }
    }

    /// JVM flag value to apply.
    pub fn region_size(&self) -> &'static str {
        match self {
            RegionSizeLabel::Region16M => "16M",
            RegionSizeLabel::Region32M | RegionSizeLabel::Region32MWithWarning => "32M",
        }
    }

    /// Whether the recommendation carries a humongous-object warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, RegionSizeLabel::Region32MWithWarning)
    }
}

impl fmt::Display for RegionSizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A region size recommendation and why it was made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommended setting.
    pub region_size_label: RegionSizeLabel,
    /// Human-readable reason.
    pub reason_text: String,
}

impl Recommendation {
    /// The JVM option line, e.g. `-XX:G1HeapRegionSize=16M`.
    pub fn jvm_flag(&self) -> String {
        format!("-XX:G1HeapRegionSize={}", self.region_size_label.region_size())
    }
}

/// Maps the largest observed size to a [`Recommendation`].
pub struct Recommender;

impl Recommender {
    /// Recommend a region size for a largest object of `max_size_bytes`.
    pub fn recommend(max_size_bytes: u64) -> Recommendation {
        let mib = bytes_to_mib(max_size_bytes);

        let (label, reason) = if mib < SMALL_REGION_LIMIT_MIB {
            (RegionSizeLabel::Region16M, "largest object below 8MB")
        } else if mib < HUMONGOUS_LIMIT_MIB {
            (RegionSizeLabel::Region32M, "largest object between 8 and 16MB")
        } else {
            (
                RegionSizeLabel::Region32MWithWarning,
                "object ≥16MB will be classified oversized by a 32MB-region collector",
            )
        };

        Recommendation {
            region_size_label: label,
            reason_text: reason.to_string(),
        }
    }
}
