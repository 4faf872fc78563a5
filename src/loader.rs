//! Loader collaborator (spec.md §6), consumed by `Cache::get_or_load`.
//!
//! Grounded on the teacher's external-collaborator trait shape
//! (`db/db.rs::Storage`, `upstream/upstream.rs::Upstream`): an
//! `#[async_trait::async_trait]` boundary the core depends on but never
//! implements itself. Deduplicating concurrent loads for the same key is
//! explicitly unspecified (spec.md §9); this trait does not attempt it.

use std::time::Duration;

use async_trait::async_trait;

/// External value source consulted by `Cache::get_or_load` on a miss.
#[async_trait]
pub trait Loader<V>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads a single value. A `ttl` of `None` means "use the cache's
    /// default TTL" (spec.md §6: "a TTL of zero from the loader means use
    /// cache default").
    async fn load(&self, key: &str) -> Result<(V, Option<Duration>), Self::Error>;

    /// Loads several keys at once. The default implementation calls `load`
    /// sequentially; implementors with a batch-capable backend should
    /// override this.
    async fn load_batch(
        &self,
        keys: &[String],
    ) -> Vec<(String, Result<(V, Option<Duration>), Self::Error>)>
    where
        V: Send,
    {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push((key.clone(), self.load(key).await));
        }
        out
    }
}
