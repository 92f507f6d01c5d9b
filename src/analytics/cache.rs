use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

struct CacheState<K, V> {
    ttl: Duration,
    entries: HashMap<K, CacheEntry<V>>,
}

/// Memoizes computed values per key for a fixed time-to-live.
///
/// Hits hand back a clone of the stored value, so `V` is meant to be an
/// `Arc` (or an enum of them): a hit then shares the very object stored on
/// the miss. A zero TTL disables caching entirely. There is no per-key
/// eviction; [`TtlCache::invalidate`] drops everything.
pub struct TtlCache<K, V> {
    state: Mutex<CacheState<K, V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                ttl,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.lock().ttl
    }

    /// Change the TTL. Existing entries are judged against the new value.
    pub fn set_ttl(&self, ttl: Duration) {
        self.lock().ttl = ttl;
    }

    /// Return the live entry for `key`, or compute, store and return it.
    ///
    /// The lock is held across the computation, so concurrent misses on the
    /// same key are serialized rather than racing on the map.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        let mut state = self.lock();
        let ttl = state.ttl;

        if ttl.is_zero() {
            return compute();
        }

        if let Some(entry) = state.entries.get(&key)
            && entry.inserted_at.elapsed() < ttl
        {
            tracing::debug!("Analytics cache hit");
            return entry.value.clone();
        }

        tracing::debug!("Analytics cache miss");
        let value = compute();
        state.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                inserted_at: Instant::now(),
            },
        );
        value
    }

    /// Drop every entry.
    pub fn invalidate(&self) {
        self.lock().entries.clear();
    }

    /// Run `f` while holding the cache lock, then drop every entry. Nothing
    /// can be cached between `f` and the clear.
    pub fn invalidate_with(&self, f: impl FnOnce()) {
        let mut state = self.lock();
        f();
        state.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
