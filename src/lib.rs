//! `corecache`: an in-process, concurrent, bounded key-value cache with TTL
//! expiry and pluggable eviction/admission policies.
//!
//! The foreground path (`get`/`set`/`delete`) never awaits; TTL expiry,
//! memory-trim/rebalance, and (optionally) access-time bookkeeping run on
//! background `tokio` tasks started by [`Cache::new`] and stopped by
//! [`Cache::close`].
//!
//! ```no_run
//! use corecache::{Cache, Config};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache: std::sync::Arc<Cache<Vec<u8>>> = Cache::new(Config::default()).unwrap();
//! cache.set("hello", b"world".to_vec(), None).unwrap();
//! assert_eq!(cache.get("hello").unwrap(), Some(b"world".to_vec()));
//! # }
//! ```

pub mod admission;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod doorkeeper;
pub mod entry;
pub mod error;
pub mod hash;
pub mod heap;
pub mod keylock;
pub mod loader;
pub mod metrics;
pub mod optimizer;
pub mod policy;
mod rand;
pub mod shutdown;
pub mod sketch;
pub mod store;
pub mod ttl;

pub use cache::Cache;
pub use config::{AdmissionPolicy, Config, EvictionPolicy, MetricsLevel};
pub use entry::Weigh;
pub use error::{CacheError, ConfigError};
pub use loader::Loader;
pub use metrics::StatsSnapshot;
