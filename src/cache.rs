//! Cache façade (component K): ties the store (D), the chosen eviction
//! policy (F-J), the TTL manager (E), and the optional admission/access/
//! optimizer subsystems behind one embeddable `get`/`set`/`delete`/`clear`/
//! `stats`/`close` surface.
//!
//! Grounded on the teacher's `db/db.rs` `DB`/`Storage` split — `DB::new`
//! wires workers and starts them immediately, rather than handing the
//! caller a separate `start()` step — collapsed from the teacher's
//! HTTP-request-shaped `Storage::get(&Entry)` into a generic
//! `Cache<V>::get(&str)` library surface. `close()` is grounded on
//! `shutdown/mod.rs`'s `GracefulShutdown`.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::admission::Admitter;
use crate::clock;
use crate::config::{AdmissionPolicy, Config, EvictionPolicy};
use crate::entry::{Entry, Weigh};
use crate::error::CacheError;
use crate::hash::{fingerprint, shard_index};
use crate::keylock::KeyLock;
use crate::loader::Loader;
use crate::metrics::{Metrics, StatsSnapshot};
use crate::optimizer::{self, OptimizerCounters};
use crate::policy::{
    LfuBucketPolicy, LfuHeapPolicy, LruPolicy, Policy, SampledLfuPolicy, TinyLfuPolicy,
};
use crate::shutdown::GracefulShutdown;
use crate::store::{AccessPipeline, Store};
use crate::ttl::{spawn_scavenger, TtlManager};

/// An embeddable, in-process bounded cache over values of type `V`.
pub struct Cache<V> {
    config: Config,
    store: Arc<Store<V>>,
    policy: Arc<dyn Policy>,
    ttl: Arc<TtlManager<V>>,
    admitter: Option<Admitter>,
    access: Option<AccessPipeline>,
    metrics: Arc<Metrics>,
    optimizer_counters: Arc<OptimizerCounters>,
    keylock: KeyLock,
    shutdown: GracefulShutdown,
    closed: AtomicBool,
}

fn estimated_capacity(config: &Config) -> usize {
    if config.max_entries > 0 {
        config.max_entries as usize
    } else {
        (config.shard_count * config.initial_capacity_per_shard).max(1)
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Builds the cache and starts its background subsystems (TTL
    /// scavenger, optimizer, and — if configured — the async access-time
    /// worker pool), the way the teacher's `DB::new` wires and starts its
    /// workers in one call rather than a separate `start()` step.
    pub fn new(config: Config) -> Result<Arc<Self>, crate::error::ConfigError> {
        config.validate()?;

        let store = Arc::new(Store::new(config.shard_count));

        let policy: Arc<dyn Policy> = match config.eviction_policy {
            EvictionPolicy::Lru => Arc::new(LruPolicy::new()),
            EvictionPolicy::Lfu => Arc::new(LfuBucketPolicy::new()),
            EvictionPolicy::LfuHeap => Arc::new(LfuHeapPolicy::new()),
            EvictionPolicy::SampledLfu => Arc::new(SampledLfuPolicy::with_sample_size(config.sample_size)),
            EvictionPolicy::WTinyLfu => Arc::new(TinyLfuPolicy::new(
                estimated_capacity(&config),
                config.window_ratio,
                config.sketch_depth,
                config.sketch_width,
                config.reset_after,
                config.enable_doorkeeper,
            )),
        };

        // W-TinyLFU already carries its own admission contest; a second,
        // independent admitter on top of it would double-gate the same
        // decision, so the façade only builds one when the eviction policy
        // doesn't already embed one.
        let admitter = match (config.admission_policy, config.eviction_policy) {
            (AdmissionPolicy::None, _) => None,
            (_, EvictionPolicy::WTinyLfu) => None,
            _ => Some(Admitter::new(
                config.sketch_depth,
                config.sketch_width,
                config.reset_after,
                config.enable_doorkeeper,
            )),
        };

        let ttl = Arc::new(
            TtlManager::new(store.clone())
                .with_min_slide_precision_ns(config.min_slide_precision_ms.saturating_mul(1_000_000)),
        );

        let metrics = Arc::new(Metrics::new(
            config.metrics_level,
            config.histogram_buckets,
            config.shard_count,
            config.enable_shard_metrics,
        ));
        let optimizer_counters = Arc::new(OptimizerCounters::default());
        let shutdown = GracefulShutdown::new();

        if config.cleanup_interval_ms > 0 {
            spawn_scavenger(
                ttl.clone(),
                clock::now_unix_nano,
                Duration::from_millis(config.cleanup_interval_ms),
                config.max_clean_items,
                10,
                shutdown.token(),
            );
        }

        if config.max_memory_bytes > 0 {
            optimizer::spawn(
                store.clone(),
                clock::now_unix_nano,
                Duration::from_millis(config.cleanup_interval_ms.max(1_000)),
                config.max_memory_bytes,
                (config.shard_count * 16).max(64),
                optimizer_counters.clone(),
                shutdown.token(),
            );
        }

        let access = config
            .async_access_update
            .then(|| AccessPipeline::spawn(store.clone(), num_cpus::get().max(1), config.batch_size.max(1) * 64, shutdown.token()));

        let _ = clock::start(Duration::from_millis(config.clock_resolution_ms.max(1)));

        Ok(Arc::new(Self {
            config,
            store,
            policy,
            ttl,
            admitter,
            access,
            metrics,
            optimizer_counters,
            keylock: KeyLock::new(),
            shutdown,
            closed: AtomicBool::new(false),
        }))
    }

    fn now_ns(&self) -> i64 {
        clock::now_unix_nano()
    }

    fn default_ttl(&self) -> Option<Duration> {
        (self.config.default_ttl_ms > 0).then(|| Duration::from_millis(self.config.default_ttl_ms as u64))
    }

    fn clamp_ttl(&self, ttl: Duration) -> Duration {
        let floor = Duration::from_secs(self.config.min_ttl_seconds.max(0) as u64);
        ttl.max(floor)
    }

    fn resolve_expire_at(&self, ttl: Option<Duration>, now_ns: i64) -> Option<i64> {
        let ttl = ttl.or_else(|| self.default_ttl())?;
        let ttl = self.clamp_ttl(ttl);
        Some(now_ns + ttl.as_nanos() as i64)
    }

    fn is_expired(&self, fingerprint: u64, now_ns: i64) -> bool {
        matches!(
            self.store.shard(fingerprint).expire_at_ns(fingerprint),
            Some(Some(t)) if now_ns >= t
        )
    }

    fn expire_now(&self, fingerprint: u64) {
        let (_, hit) = self.store.remove(fingerprint);
        if hit {
            self.policy.remove(fingerprint);
            self.metrics.record_expiration();
        }
    }

    fn at_capacity(&self) -> bool {
        (self.config.max_entries > 0 && self.store.len() >= self.config.max_entries)
            || (self.config.max_memory_bytes > 0 && self.store.mem() >= self.config.max_memory_bytes)
    }

    /// Runs the admission contest for a brand-new key when the cache is
    /// already at capacity. Returns `Some(error)` if the candidate loses.
    fn reject_admission(&self, candidate_fp: u64, now_ns: i64) -> Option<CacheError> {
        let admitter = self.admitter.as_ref()?;
        if !self.at_capacity() {
            return None;
        }
        let victim_fp = self.policy.evict_one()?;
        if admitter.allow(candidate_fp, Some(victim_fp)) {
            let (_, hit) = self.store.remove(victim_fp);
            if hit {
                self.metrics.record_eviction();
            }
            None
        } else {
            // Candidate loses the contest: give the victim its bookkeeping
            // back without treating it as freshly used, and reject the
            // insert.
            self.policy.restore(victim_fp, 0, now_ns);
            Some(CacheError::AdmissionDenied)
        }
    }

    fn enforce_capacity(&self) {
        while self.at_capacity() {
            match self.policy.evict_one() {
                Some(victim_fp) => {
                    let (_, hit) = self.store.remove(victim_fp);
                    if hit {
                        self.metrics.record_eviction();
                    }
                }
                None => break,
            }
        }
    }

    fn check_open(&self) -> Result<(), CacheError> {
        if self.closed.load(AtomicOrdering::Acquire) {
            Err(CacheError::CacheClosed)
        } else {
            Ok(())
        }
    }

    /// Looks up `key`. A hit bumps the policy's ordering/frequency state
    /// and, if sliding expiration is enabled, pushes the TTL out.
    pub fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        self.check_open()?;
        let started = Instant::now();
        let fp = fingerprint(key.as_bytes());
        let now_ns = self.now_ns();
        let shard_idx = shard_index(fp, self.store.shard_count());

        if self.is_expired(fp, now_ns) {
            self.expire_now(fp);
            self.metrics.record_miss(shard_idx, started.elapsed().as_nanos() as i64);
            return Ok(None);
        }

        let value = if self.config.async_access_update {
            let value = self.store.get(fp);
            if value.is_some() {
                if let Some(access) = &self.access {
                    access.touch(fp, now_ns);
                }
            }
            value
        } else {
            self.store.get_and_touch(fp, now_ns)
        };

        match &value {
            Some(_) => {
                self.policy.on_access(fp, now_ns);
                if let Some(admitter) = &self.admitter {
                    admitter.record(fp);
                }
                if self.config.sliding_expiration {
                    if let Some(ttl) = self.default_ttl() {
                        self.ttl.slide(fp, self.clamp_ttl(ttl).as_nanos() as i64, now_ns);
                    }
                }
                self.metrics.record_hit(shard_idx, started.elapsed().as_nanos() as i64);
            }
            None => {
                self.metrics.record_miss(shard_idx, started.elapsed().as_nanos() as i64);
            }
        }
        Ok(value)
    }

    /// Inserts or overwrites `key`. `ttl` overrides the configured default;
    /// `None` means "use the cache's `default-ttl-ms`, if any".
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError>
    where
        V: Weigh,
    {
        self.check_open()?;
        let started = Instant::now();
        let fp = fingerprint(key.as_bytes());
        let now_ns = self.now_ns();
        let weight = value.weigh();
        let expire_at_ns = self.resolve_expire_at(ttl, now_ns);

        let overwrote = self.store.contains(fp);
        if !overwrote {
            if let Some(admitter) = &self.admitter {
                admitter.record(fp);
            }
            if let Some(err) = self.reject_admission(fp, now_ns) {
                self.metrics.record_rejection();
                return Err(err);
            }
        }

        self.store.set(fp, Entry::new(value, weight, now_ns, expire_at_ns));
        self.policy.add(fp, weight, now_ns);
        if let Some(expire_at) = expire_at_ns {
            self.ttl.schedule(fp, expire_at);
        }
        self.metrics.record_set(overwrote, started.elapsed().as_nanos() as i64);
        self.enforce_capacity();
        Ok(())
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.check_open()?;
        let started = Instant::now();
        let fp = fingerprint(key.as_bytes());
        let (_, hit) = self.store.remove(fp);
        if hit {
            self.policy.remove(fp);
        }
        self.metrics.record_delete(started.elapsed().as_nanos() as i64);
        Ok(hit)
    }

    /// Drops every entry and resets the eviction policy's bookkeeping.
    pub fn clear(&self) {
        self.store.clear();
        self.policy.clear();
    }

    pub fn len(&self) -> i64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// A consistent snapshot of every counter this cache tracks (spec.md
    /// §3). `entry_count`/`byte_size` come from the store; everything else
    /// comes from `Metrics`.
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.entry_count = self.store.len();
        snapshot.byte_size = self.store.mem();
        snapshot.dropped_access_events = self.access.as_ref().map_or(0, |a| a.dropped_count());
        snapshot
    }

    pub fn optimizer_ticks(&self) -> u64 {
        self.optimizer_counters
            .ticks
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    /// A per-key mutex an embedder can use to serialize its own critical
    /// sections against this cache (e.g. a hand-rolled loader-coalescing
    /// scheme). Not used internally — `get_or_load` does not deduplicate
    /// concurrent misses for the same key.
    pub fn keylock(&self) -> &KeyLock {
        &self.keylock
    }

    /// Reads `key`, falling back to `loader` on a miss and populating the
    /// cache with whatever it returns. Concurrent misses for the same key
    /// each call the loader independently; this does not coalesce them.
    pub async fn get_or_load<L>(&self, key: &str, loader: &L) -> Result<V, CacheError>
    where
        V: Weigh,
        L: Loader<V>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let (value, ttl) = loader
            .load(key)
            .await
            .map_err(|e| CacheError::LoaderFailed(e.to_string()))?;
        self.set(key, value.clone(), ttl)?;
        Ok(value)
    }

    /// Signals every background subsystem to stop. Returns once the
    /// cancellation has been observed by the subsystems that report back
    /// through the shared wait-group; subsystems spawned without a tracked
    /// guard (the TTL scavenger, optimizer, and access pipeline currently
    /// fall in this category) are only asked to stop, not waited on, since
    /// their spawn functions don't hand back a completion handle.
    pub async fn close(&self, timeout: Duration) -> bool {
        debug!(component = "cache", event = "closing");
        self.closed.store(true, AtomicOrdering::Release);
        self.shutdown.cancel_and_await(timeout).await
    }
}
