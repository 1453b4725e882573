//! Thread-Safe Storage Engine with Per-Key Expiry
//!
//! This module implements the key-value store shared by every connection.
//! Keys and values are arbitrary bytes; a key may carry a TTL, enforced by a
//! per-key timer from the [`ExpiryScheduler`].
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The key map, the expiry handles and the timer bookkeeping
//!    live behind a single `Mutex`. "Cancel the old timer, install the value,
//!    arm the new timer" is one critical section, and so is the timer's own
//!    "check and delete".
//! 2. **Generations**: Every SET stamps the entry with a fresh generation
//!    number. A timer only deletes the generation it was armed for.
//! 3. **Lazy Check**: `get` also honours the deadline stored in the entry, so
//!    a timer that runs late never exposes an expired value.
//! 4. **Weak Back-Reference**: Timers hold a `Weak` pointer to the store and
//!    become no-ops once it is gone.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐
//! │ connection │   │ connection │   │ expiry timer │
//! └─────┬──────┘   └─────┬──────┘   └──────┬───────┘
//!       │  set/get       │  set/get        │  fire(key, generation)
//!       ▼                ▼                 ▼
//! ┌─────────────────────────────────────────────────┐
//! │        Mutex<Keyspace>                          │
//! │  key → { value, generation, deadline, timer }   │
//! └─────────────────────────────────────────────────┘
//! ```

use crate::storage::expiry::{ExpiryHandle, ExpiryScheduler, Generation};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A stored value, its generation and its optional expiry timer.
#[derive(Debug)]
struct Entry {
    value: Bytes,
    generation: Generation,
    /// When this entry expires (None = never expires)
    expires_at: Option<Instant>,
    expiry: Option<ExpiryHandle>,
}

impl Entry {
    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<Bytes, Entry>,
    next_generation: Generation,
    /// Number of entries holding a live timer.
    armed: usize,
}

impl Keyspace {
    fn next_generation(&mut self) -> Generation {
        self.next_generation += 1;
        self.next_generation
    }

    /// Removes `key` and cancels its timer, if any.
    fn remove_and_cancel(&mut self, key: &[u8]) -> Option<Entry> {
        let mut entry = self.entries.remove(key)?;
        if let Some(handle) = entry.expiry.take() {
            handle.cancel();
            self.armed -= 1;
        }
        Some(entry)
    }
}

/// State shared between the engine and its timers.
#[derive(Debug, Default)]
struct Shared {
    keyspace: Mutex<Keyspace>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: number of keys removed because their TTL ran out
    expired_count: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Keyspace> {
        // Every critical section leaves the map consistent, so a panic in
        // another holder doesn't invalidate it.
        self.keyspace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback: deletes `key` if it still holds `generation`.
    fn fire(&self, key: &Bytes, generation: Generation) {
        let mut keyspace = self.lock();

        let current = keyspace.entries.get(key).map(|entry| entry.generation);
        if current != Some(generation) {
            trace!(?key, generation, "Stale expiry timer ignored");
            return;
        }

        // This timer is the entry's own handle; it is finishing, not cancelled.
        if let Some(entry) = keyspace.entries.remove(key) {
            if entry.expiry.is_some() {
                keyspace.armed -= 1;
            }
        }
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        debug!(?key, generation, "Key expired");
    }
}

/// Snapshot of the store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub expired: u64,
    pub pending_expiries: u64,
}

/// The key-value store shared by all connections.
///
/// Wrap it in an `Arc` and hand a clone to every connection handler. Writes
/// with a TTL arm a timer on the current Tokio runtime, so `set` with
/// `Some(ttl)` must be called from within one.
///
/// # Example
///
/// ```
/// use respkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
/// assert_eq!(engine.get(b"missing"), None);
/// ```
pub struct StorageEngine {
    shared: Arc<Shared>,
    scheduler: ExpiryScheduler,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("StorageEngine")
            .field("keys", &stats.keys)
            .field("pending_expiries", &stats.pending_expiries)
            .field("get_ops", &stats.get_ops)
            .field("set_ops", &stats.set_ops)
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            scheduler: ExpiryScheduler::new(),
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Any timer armed for the previous value is cancelled first, whether or
    /// not `ttl` is given. With `Some(ttl)` a new timer is armed that removes
    /// the key once `ttl` has elapsed, unless the key is written again before
    /// that.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> bool {
        self.shared.set_count.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.shared.lock();
        let is_new = keyspace.remove_and_cancel(&key).is_none();
        let generation = keyspace.next_generation();

        let expiry = ttl.map(|ttl| {
            let shared: Weak<Shared> = Arc::downgrade(&self.shared);
            self.scheduler
                .arm(key.clone(), generation, ttl, move |key, generation| {
                    if let Some(shared) = shared.upgrade() {
                        shared.fire(&key, generation);
                    }
                })
        });
        if expiry.is_some() {
            keyspace.armed += 1;
        }

        keyspace.entries.insert(
            key,
            Entry {
                value,
                generation,
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
                expiry,
            },
        );

        is_new
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An entry whose
    /// deadline has passed but whose timer hasn't run yet is removed here.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.shared.get_count.fetch_add(1, Ordering::Relaxed);

        let mut keyspace = self.shared.lock();
        match keyspace.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => {}
        }

        keyspace.remove_and_cancel(key);
        self.shared.expired_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Gets the remaining TTL for a key in milliseconds.
    ///
    /// # Returns
    ///
    /// - `Some(Some(ms))` if the key exists and has an expiry
    /// - `Some(None)` if the key exists but has no expiry
    /// - `None` if the key doesn't exist
    pub fn ttl_ms(&self, key: &[u8]) -> Option<Option<u64>> {
        let keyspace = self.shared.lock();
        let entry = keyspace.entries.get(key).filter(|e| !e.is_expired())?;

        Some(entry.expires_at.map(|exp| {
            exp.saturating_duration_since(Instant::now()).as_millis() as u64
        }))
    }

    /// Whether `key` currently has an armed expiry timer.
    pub fn has_pending_expiry(&self, key: &[u8]) -> bool {
        let keyspace = self.shared.lock();
        keyspace
            .entries
            .get(key)
            .map(|entry| entry.expiry.is_some())
            .unwrap_or(false)
    }

    /// Total number of armed expiry timers across all keys.
    pub fn pending_expiries(&self) -> usize {
        self.shared.lock().armed
    }

    /// Returns the number of keys in the store, including keys whose
    /// deadline has passed but which haven't been removed yet.
    pub fn len(&self) -> u64 {
        self.shared.lock().entries.len() as u64
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        let (keys, pending) = {
            let keyspace = self.shared.lock();
            (keyspace.entries.len() as u64, keyspace.armed as u64)
        };

        StorageStats {
            keys,
            get_ops: self.shared.get_count.load(Ordering::Relaxed),
            set_ops: self.shared.set_count.load(Ordering::Relaxed),
            expired: self.shared.expired_count.load(Ordering::Relaxed),
            pending_expiries: pending,
        }
    }
}

impl Drop for StorageEngine {
    fn drop(&mut self) {
        let mut keyspace = self.shared.lock();
        for entry in keyspace.entries.values_mut() {
            if let Some(handle) = entry.expiry.take() {
                handle.cancel();
            }
        }
        keyspace.armed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        assert!(engine.set(key("key"), key("value"), None));
        assert_eq!(engine.get(b"key"), Some(key("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent"), None);
    }

    #[test]
    fn test_overwrite_returns_latest() {
        let engine = StorageEngine::new();

        assert!(engine.set(key("k"), key("v1"), None));
        assert!(!engine.set(key("k"), key("v2"), None));
        assert_eq!(engine.get(b"k"), Some(key("v2")));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_binary_keys_are_exact() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from_static(b"k\x00\r\n"), key("binary"), None);
        engine.set(key("K"), key("upper"), None);
        engine.set(key("k"), key("lower"), None);

        assert_eq!(engine.get(b"k\x00\r\n"), Some(key("binary")));
        assert_eq!(engine.get(b"K"), Some(key("upper")));
        assert_eq!(engine.get(b"k"), Some(key("lower")));
    }

    #[tokio::test]
    async fn test_expiry_removes_key() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v"), Some(Duration::from_millis(100)));
        assert_eq!(engine.get(b"k"), Some(key("v")));
        assert!(engine.has_pending_expiry(b"k"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.get(b"k"), None);
        assert!(engine.is_empty());
        assert_eq!(engine.pending_expiries(), 0);
    }

    #[tokio::test]
    async fn test_timer_deletes_without_access() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v"), Some(Duration::from_millis(20)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // No get() in between: the timer itself removed the entry.
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_overwrite_without_ttl_cancels_expiry() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v"), Some(Duration::from_millis(100)));
        engine.set(key("k"), key("v2"), None);
        assert!(!engine.has_pending_expiry(b"k"));
        assert_eq!(engine.pending_expiries(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.get(b"k"), Some(key("v2")));
        assert_eq!(engine.ttl_ms(b"k"), Some(None));
    }

    #[tokio::test]
    async fn test_overwrite_with_new_ttl_replaces_timer() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v1"), Some(Duration::from_millis(50)));
        engine.set(key("k"), key("v2"), Some(Duration::from_millis(300)));
        assert_eq!(engine.pending_expiries(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(engine.get(b"k"), Some(key("v2")));
        assert!(engine.has_pending_expiry(b"k"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(engine.get(b"k"), None);
        assert_eq!(engine.pending_expiries(), 0);
    }

    #[tokio::test]
    async fn test_stale_fire_is_ignored() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v1"), Some(Duration::from_secs(60)));
        let stale = engine.shared.lock().entries[&key("k")].generation;
        engine.set(key("k"), key("v2"), None);

        // A timer that woke up before it could be cancelled.
        engine.shared.fire(&key("k"), stale);

        assert_eq!(engine.get(b"k"), Some(key("v2")));
        assert_eq!(engine.stats().expired, 0);
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_get() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v"), Some(Duration::from_millis(20)));

        // Block the (single-threaded) runtime so the timer can't run.
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(engine.ttl_ms(b"k"), None);
        assert_eq!(engine.get(b"k"), None);
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.pending_expiries(), 0);
    }

    #[tokio::test]
    async fn test_ttl_ms() {
        let engine = StorageEngine::new();

        engine.set(key("k"), key("v"), Some(Duration::from_secs(10)));
        let remaining = engine.ttl_ms(b"k").flatten().unwrap();
        assert!(remaining > 9_000 && remaining <= 10_000);

        assert_eq!(engine.ttl_ms(b"missing"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_keeps_one_timer() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for task in 0..8u64 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                for i in 0..200u64 {
                    let ttl = if (task + i) % 3 == 0 {
                        None
                    } else {
                        Some(Duration::from_secs(60))
                    };
                    engine.set(key("shared"), Bytes::from(format!("{task}-{i}")), ttl);
                    assert!(engine.pending_expiries() <= 1);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(engine.pending_expiries() <= 1);
        assert_eq!(
            engine.pending_expiries() == 1,
            engine.has_pending_expiry(b"shared")
        );
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        // Spawn multiple writers
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let k = Bytes::from(format!("key-{}-{}", i, j));
                    engine.set(k.clone(), key("value"), None);
                    assert_eq!(engine.get(&k), Some(key("value")));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();

        engine.set(key("a"), key("1"), None);
        engine.set(key("b"), key("2"), None);
        engine.get(b"a");
        engine.get(b"missing");

        let stats = engine.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.set_ops, 2);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.pending_expiries, 0);
    }
}
