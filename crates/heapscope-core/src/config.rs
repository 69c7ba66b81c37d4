//! Configuration module for heapscope
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ProfilerError, Result};

/// Default number of samples collected per partition in a deep scan
pub const DEEP_SAMPLE_BUDGET: u64 = 100_000;

/// Default number of samples collected per partition in a quick scan
pub const QUICK_SAMPLE_BUDGET: u64 = 100;

/// Partitions with more entries than this are sampled instead of walked
pub const DEFAULT_SMALL_PARTITION_THRESHOLD: u64 = 10_000;

/// Entries examined, in iteration order, for a small partition
pub const DEFAULT_SMALL_PARTITION_CAP: u64 = 100;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling configuration
    pub sampling: SamplingConfig,

    /// Partition scan configuration
    pub scan: ScanConfig,

    /// Top-N function configuration
    pub top_n: TopNConfig,

    /// Cluster execution configuration
    pub cluster: ClusterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProfilerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ProfilerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize the effective configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProfilerError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;

        if self.top_n.default_n == 0 {
            return Err(ProfilerError::Config(
                "top_n.default_n cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Sampling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Maximum samples collected per partition
    pub target_sample_budget: u64,

    /// Partitions at or below this entry count are walked in iteration order
    pub small_partition_threshold: u64,

    /// Maximum entries examined when walking a small partition
    pub small_partition_cap: u64,

    /// Use the host's bounded bulk fetch for large partitions when offered
    pub prefer_bounded_fetch: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::deep()
    }
}

impl SamplingConfig {
    /// Preset for fast, shallow scans
    pub fn quick() -> Self {
        Self {
            target_sample_budget: QUICK_SAMPLE_BUDGET,
            ..Self::deep()
        }
    }

    /// Preset for thorough scans
    pub fn deep() -> Self {
        Self {
            target_sample_budget: DEEP_SAMPLE_BUDGET,
            small_partition_threshold: DEFAULT_SMALL_PARTITION_THRESHOLD,
            small_partition_cap: DEFAULT_SMALL_PARTITION_CAP,
            prefer_bounded_fetch: true,
        }
    }

    /// Validate sampling limits
    pub fn validate(&self) -> Result<()> {
        if self.target_sample_budget == 0 {
            return Err(ProfilerError::Config(
                "sampling.target_sample_budget must be at least 1".to_string(),
            ));
        }
        if self.small_partition_cap == 0 {
            return Err(ProfilerError::Config(
                "sampling.small_partition_cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partition scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of largest samples retained per partition
    pub top_k: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

/// Configuration for the per-partition top-N function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopNConfig {
    /// N used when the caller passes no argument
    pub default_n: usize,
}

impl Default for TopNConfig {
    fn default() -> Self {
        Self { default_n: 3 }
    }
}

/// Cluster execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Seconds to wait for a single member's report (0 = wait indefinitely)
    pub node_timeout_secs: u64,
}

impl ClusterConfig {
    /// Per-member timeout, if one is configured
    pub fn node_timeout(&self) -> Option<Duration> {
        (self.node_timeout_secs > 0).then(|| Duration::from_secs(self.node_timeout_secs))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling.target_sample_budget, 100_000);
        assert_eq!(config.sampling.small_partition_threshold, 10_000);
        assert_eq!(config.sampling.small_partition_cap, 100);
        assert!(config.sampling.prefer_bounded_fetch);
        assert_eq!(config.scan.top_k, 10);
        assert_eq!(config.top_n.default_n, 3);
        assert_eq!(config.cluster.node_timeout(), None);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_str() {
        let toml = r#"
[sampling]
target_sample_budget = 500
prefer_bounded_fetch = false

[scan]
top_k = 3

[cluster]
node_timeout_secs = 30

[logging]
level = "debug"
format = "json"
"#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.sampling.target_sample_budget, 500);
        assert!(!config.sampling.prefer_bounded_fetch);
        assert_eq!(config.sampling.small_partition_cap, 100);
        assert_eq!(config.scan.top_k, 3);
        assert_eq!(config.cluster.node_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_quick_preset() {
        let quick = SamplingConfig::quick();
        assert_eq!(quick.target_sample_budget, 100);
        assert_eq!(quick.small_partition_threshold, 10_000);
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = Config::default();
        config.sampling.target_sample_budget = 0;
        assert!(matches!(config.validate(), Err(ProfilerError::Config(_))));

        let mut config = Config::default();
        config.sampling.small_partition_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::parse_str("[sampling\nbroken").is_err());
    }

    #[test]
    fn test_toml_roundtrip_preserves_values() {
        let mut config = Config::default();
        config.scan.top_k = 7;
        let text = config.to_toml_string().unwrap();
        let parsed = Config::parse_str(&text).unwrap();
        assert_eq!(parsed.scan.top_k, 7);
        assert_eq!(parsed.sampling, config.sampling);
    }
}
