//! Configuration surface (spec.md §6), in the teacher's typed-struct-plus-
//! validation shape (`config::Cache`), trimmed to the knobs this library
//! actually recognises — no YAML/upstream/k8s fields, those back an HTTP
//! proxy, not this crate.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which eviction policy backs the cache once it is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    LfuHeap,
    SampledLfu,
    WTinyLfu,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

/// Which frequency-estimation admission policy gates inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionPolicy {
    None,
    CountMin,
    TinyLfu,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricsLevel {
    Disabled,
    Basic,
    Detailed,
}

impl Default for MetricsLevel {
    fn default() -> Self {
        MetricsLevel::Disabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_entries: i64,
    pub max_memory_bytes: i64,
    pub default_ttl_ms: i64,
    pub cleanup_interval_ms: u64,

    pub shard_count: usize,
    pub initial_capacity_per_shard: usize,
    pub load_factor: f64,
    pub async_access_update: bool,
    pub batch_size: usize,

    pub admission_policy: AdmissionPolicy,
    pub sketch_depth: u32,
    pub sketch_width: u32,
    pub reset_after: u64,
    pub enable_doorkeeper: bool,

    pub eviction_policy: EvictionPolicy,
    pub window_ratio: f64,
    pub sample_size: usize,
    pub sample_ratio: f64,
    pub min_ttl_seconds: i64,
    pub max_eviction_ratio: f64,

    pub metrics_level: MetricsLevel,
    pub histogram_buckets: usize,
    pub enable_shard_metrics: bool,

    pub max_clean_items: u64,
    pub sliding_expiration: bool,
    pub min_slide_precision_ms: i64,

    /// How often the cached process-wide clock (component N) refreshes
    /// itself from a `SystemTime::now()` syscall.
    pub clock_resolution_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 0,
            max_memory_bytes: 0,
            default_ttl_ms: 0,
            cleanup_interval_ms: 30_000,

            shard_count: 256,
            initial_capacity_per_shard: 64,
            load_factor: 0.75,
            async_access_update: false,
            batch_size: 32,

            admission_policy: AdmissionPolicy::None,
            sketch_depth: 4,
            sketch_width: 16,
            reset_after: 100_000,
            enable_doorkeeper: false,

            eviction_policy: EvictionPolicy::Lru,
            window_ratio: 0.01,
            sample_size: 5,
            sample_ratio: 0.1,
            min_ttl_seconds: 10,
            max_eviction_ratio: 0.25,

            metrics_level: MetricsLevel::Disabled,
            histogram_buckets: 10,
            enable_shard_metrics: false,

            max_clean_items: 1_000,
            sliding_expiration: false,
            min_slide_precision_ms: 500,

            clock_resolution_ms: 1,
        }
    }
}

impl Config {
    /// Validates the configuration, failing fast the way the teacher's
    /// `Config::load` rejects a malformed manifest at construction rather
    /// than at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 {
            return Err(ConfigError::MustBePositive {
                field: "shard_count",
                value: 0,
            });
        }
        if !self.shard_count.is_power_of_two() {
            return Err(ConfigError::MustBePowerOfTwo {
                field: "shard_count",
                value: self.shard_count,
            });
        }
        check_ratio("load_factor", self.load_factor)?;
        check_ratio("window_ratio", self.window_ratio)?;
        check_ratio("sample_ratio", self.sample_ratio)?;
        check_ratio("max_eviction_ratio", self.max_eviction_ratio)?;

        if self.sketch_depth == 0 {
            return Err(ConfigError::MustBePositive {
                field: "sketch_depth",
                value: 0,
            });
        }
        if self.sketch_width == 0 {
            return Err(ConfigError::MustBePositive {
                field: "sketch_width",
                value: 0,
            });
        }
        Ok(())
    }
}

fn check_ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value > 1.0 {
        return Err(ConfigError::MustBePositive {
            field,
            value: (value * 1000.0) as i64,
        });
    }
    Ok(())
}
