//! Error types (component per spec.md §7).
//!
//! One `thiserror` enum per concern, following the teacher's per-module
//! convention (`UpstreamError`, `TimeoutError`, …) rather than a single
//! catch-all enum.

use thiserror::Error;

/// Errors surfaced by `Cache<V>`'s public operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("key not found")]
    NotFound,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("cache is at capacity and no victim could be evicted")]
    CacheFull,

    #[error("cache has been closed")]
    CacheClosed,

    #[error("admission denied for key (frequency too low to displace victim)")]
    AdmissionDenied,

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("no loader configured for get-or-load")]
    LoaderNotConfigured,

    #[error("loader failed: {0}")]
    LoaderFailed(String),
}

/// Errors from `Config::validate`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero, got {value}")]
    MustBePositive { field: &'static str, value: i64 },

    #[error("{field} must be a power of two, got {value}")]
    MustBePowerOfTwo { field: &'static str, value: usize },

    #[error("{field} ({low}) must not exceed {other_field} ({high})")]
    OrderingViolation {
        field: &'static str,
        low: i64,
        other_field: &'static str,
        high: i64,
    },

    #[error("unknown eviction policy: {0}")]
    UnknownPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_error_messages_are_human_readable() {
        assert_eq!(CacheError::NotFound.to_string(), "key not found");
        assert_eq!(
            CacheError::InvalidKey("".into()).to_string(),
            "invalid key: "
        );
    }

    #[test]
    fn config_error_messages_include_field_context() {
        let e = ConfigError::MustBePositive {
            field: "shard_count",
            value: 0,
        };
        assert!(e.to_string().contains("shard_count"));
    }
}
