//! Asynchronous access-time update pipeline.
//!
//! The teacher always touches LRU ordering synchronously under the shard's
//! write lock (`shard.touch_lru`). This is new code for the asynchronous
//! mode spec.md also calls for: a bounded `tokio::sync::mpsc` channel of
//! touch events drained by a small worker pool, so a foreground `get` can
//! enqueue a touch and return without waiting on it. Events are dropped,
//! not backpressured, when the channel is full — an `async-drop` counter
//! records how many, matching the teacher's tolerance for lossy background
//! telemetry over blocking the hot path (`workers/evictor/evictor.rs`'s
//! counters are similarly best-effort).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Store;

/// Whether access-time updates happen inline under the shard lock, or are
/// queued to a background worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Sync,
    Async,
}

struct TouchEvent {
    fingerprint: u64,
    at_ns: i64,
}

/// Owns the channel and worker pool backing `AccessMode::Async`. Dropping
/// this without cancelling its token leaves the workers running; callers
/// should route shutdown through the same `CancellationToken` used
/// elsewhere (see `Cache::close`).
pub struct AccessPipeline {
    sender: mpsc::Sender<TouchEvent>,
    dropped: Arc<AtomicU64>,
}

impl AccessPipeline {
    /// Spawns `workers` tasks draining a channel of capacity `queue_capacity`
    /// against `store`. `workers` is typically `num_cpus::get()`, the same
    /// sizing rule the teacher uses for its own worker pools.
    pub fn spawn<V>(
        store: Arc<Store<V>>,
        workers: usize,
        queue_capacity: usize,
        token: CancellationToken,
    ) -> Self
    where
        V: Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..workers {
            let store = store.clone();
            let token = token.clone();
            let rx = rx.clone();
            tokio::task::spawn(async move {
                loop {
                    let event = {
                        let mut guard = rx.lock().await;
                        tokio::select! {
                            ev = guard.recv() => ev,
                            _ = token.cancelled() => None,
                        }
                    };
                    match event {
                        Some(ev) => {
                            store.touch(ev.fingerprint, ev.at_ns);
                        }
                        None => {
                            debug!(component = "access_pipeline", event = "worker_stopped", worker_id);
                            return;
                        }
                    }
                }
            });
        }

        Self {
            sender: tx,
            dropped,
        }
    }

    /// Enqueues a touch event, dropping it silently (counted) if the queue
    /// is full. Never blocks.
    pub fn touch(&self, fingerprint: u64, at_ns: i64) {
        match self.sender.try_send(TouchEvent { fingerprint, at_ns }) {
            Ok(()) => {}
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
