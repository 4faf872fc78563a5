//! Graceful shutdown (used by `Cache::close`).
//!
//! Grounded on the teacher's `shutdown/mod.rs` `GracefulShutdown`: a
//! `CancellationToken` signals background tasks to stop, and a
//! `tokio::sync::Semaphore` doubles as a wait-group — each running task
//! acquires a permit for its lifetime, and waiting for completion means
//! acquiring all of them back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, TryAcquireError};
use tokio_util::sync::CancellationToken;

const MAX_TRACKED_TASKS: usize = 4096;

/// Coordinates cancelling and waiting for a fixed set of background tasks
/// (the TTL scavenger, the optimizer, and the access-time worker pool).
pub struct GracefulShutdown {
    token: CancellationToken,
    permits: Arc<Semaphore>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            permits: Arc::new(Semaphore::new(MAX_TRACKED_TASKS)),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Registers `n` tasks as running, returning a guard each task should
    /// hold until it exits.
    pub fn track(&self, n: u32) -> TaskGuard {
        let permits = self
            .permits
            .clone()
            .try_acquire_many_owned(n)
            .expect("more tasks tracked than MAX_TRACKED_TASKS");
        TaskGuard { _permits: permits }
    }

    /// Cancels the token and waits for every tracked task to release its
    /// guard, up to `timeout`. Returns `false` if the timeout elapsed first.
    pub async fn cancel_and_await(&self, timeout: Duration) -> bool {
        self.token.cancel();
        let wait = self.permits.clone().acquire_many_owned(MAX_TRACKED_TASKS as u32);
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// True once every tracked task has already released its guard.
    pub fn is_quiescent(&self) -> bool {
        match self.permits.clone().try_acquire_many_owned(MAX_TRACKED_TASKS as u32) {
            Ok(_) => true,
            Err(TryAcquireError::NoPermits) => false,
            Err(TryAcquireError::Closed) => true,
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by a background task for its lifetime; dropping it releases the
/// permits back to the shutdown wait-group.
pub struct TaskGuard {
    _permits: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_and_await_returns_once_all_guards_drop() {
        let shutdown = GracefulShutdown::new();
        let guard = shutdown.track(1);
        let shutdown_ref = &shutdown;
        let (done, _) = tokio::join!(
            shutdown_ref.cancel_and_await(Duration::from_secs(1)),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                drop(guard);
            }
        );
        assert!(done);
    }

    #[tokio::test]
    async fn cancel_and_await_times_out_if_a_guard_is_never_dropped() {
        let shutdown = GracefulShutdown::new();
        let _guard = shutdown.track(1);
        let done = shutdown.cancel_and_await(Duration::from_millis(20)).await;
        assert!(!done);
    }

    #[test]
    fn token_is_cancelled_after_cancel_and_await() {
        let shutdown = GracefulShutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());
    }
}
