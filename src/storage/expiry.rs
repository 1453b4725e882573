//! Per-Key Expiry Scheduler
//!
//! Every key written with a TTL gets its own timer: a Tokio task that sleeps
//! for the TTL and then asks the store to delete the key. The timer belongs to
//! one *generation* of the key, i.e. one particular SET. When the key is
//! written again the store cancels the old timer before installing the new
//! value, so a key never has more than one live timer.
//!
//! ## Why the generation check?
//!
//! Cancelling a task is not instantaneous. A timer can wake up, and be
//! blocked on the store lock, at the very moment another connection
//! overwrites the key. Aborting it then is too late. So the fire path
//! re-checks, under the store lock, that the entry still carries the
//! generation the timer was armed for, and otherwise does nothing.
//!
//! ```text
//!   SET k v PX 100        SET k v2             timer wakes
//!   ───────────────►      ───────────────►     ───────────────►
//!   gen 1, arm timer      cancel gen-1 timer   lock, entry is gen 2,
//!                         store gen 2          leave it alone
//! ```

use bytes::Bytes;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies one SET of one key.
pub type Generation = u64;

/// An armed timer for one key generation.
///
/// Dropping the handle does *not* cancel the timer; the store owns handles
/// and cancels them explicitly so that cancellation happens inside its
/// critical section.
#[derive(Debug)]
pub struct ExpiryHandle {
    generation: Generation,
    task: JoinHandle<()>,
}

impl ExpiryHandle {
    /// The key generation this timer will delete.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Stops the timer. A timer that has already woken up may still run its
    /// fire callback; the callback's generation check makes that harmless.
    pub fn cancel(self) {
        trace!(generation = self.generation, "Cancelling expiry timer");
        self.task.abort();
    }

    /// Whether the timer task has run to completion or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Arms per-key expiry timers on the current Tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpiryScheduler;

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Schedules `on_fire(key, generation)` to run once `ttl` has elapsed.
    /// The callback runs on a runtime worker and may take blocking locks that
    /// are only held briefly.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, like `tokio::spawn`.
    pub fn arm<F>(
        &self,
        key: Bytes,
        generation: Generation,
        ttl: Duration,
        on_fire: F,
    ) -> ExpiryHandle
    where
        F: FnOnce(Bytes, Generation) + Send + 'static,
    {
        trace!(generation, ttl_ms = ttl.as_millis() as u64, "Arming expiry timer");

        let task = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            on_fire(key, generation);
        });

        ExpiryHandle { generation, task }
    }
}
