//! Process-wide cached clock.
//!
//! All policy and TTL decisions read this clock instead of issuing a
//! syscall per operation. A background task refreshes the cached value at a
//! fixed resolution; `now_unix_nano` is lock-free and allocation-free.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

static NOW_UNIX_NANO: AtomicI64 = AtomicI64::new(0);
static STARTED: OnceLock<()> = OnceLock::new();

fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Returns the cached time as Unix nanoseconds, initializing it lazily on
/// first use if the refresh task has not been started yet.
pub fn now_unix_nano() -> i64 {
    if STARTED.get().is_none() {
        NOW_UNIX_NANO.store(wall_clock_nanos(), Ordering::Relaxed);
    }
    NOW_UNIX_NANO.load(Ordering::Relaxed)
}

/// Starts the background refresh task at the given resolution. Returns a
/// token the caller can cancel to stop the ticker; dropping the returned
/// guard does not stop it, only explicit cancellation does.
///
/// A no-op, returning an inert token, if the clock was already started (by
/// an earlier `Cache` in this process) or already pinned by `set_for_test` —
/// the clock is process-wide, so only the first caller's resolution takes
/// effect, and a test that forced a value keeps it instead of racing a
/// ticker that would overwrite it within `resolution`.
pub fn start(resolution: Duration) -> CancellationToken {
    if STARTED.set(()).is_err() {
        return CancellationToken::new();
    }
    NOW_UNIX_NANO.store(wall_clock_nanos(), Ordering::Relaxed);

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(resolution);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    NOW_UNIX_NANO.store(wall_clock_nanos(), Ordering::Relaxed);
                }
                _ = token_clone.cancelled() => {
                    return;
                }
            }
        }
    });

    token
}

/// Test/benchmark seam: force the cached clock to a specific value without
/// starting the refresh task. Keeps TTL tests deterministic instead of
/// racing a real ticker.
#[cfg(any(test, feature = "test-util"))]
pub fn set_for_test(unix_nano: i64) {
    let _ = STARTED.set(());
    NOW_UNIX_NANO.store(unix_nano, Ordering::Relaxed);
}
