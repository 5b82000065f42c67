//! Bounded counting cache with shared-entry protection
//!
//! **Why**: playback must never evict a frame somebody is drawing from, and
//! it must never stop inserting just because everything is busy. The cache
//! therefore tracks two populations: entries with live clients (never
//! evicted) and idle entries queued LRU-first for eviction. Budgets bound
//! the steady state; correctness wins over the budget when all content is
//! in active use.
//!
//! **Used by**: `core/anim_cache.rs` (frame sets), `core/store.rs`
//!
//! # Concurrency
//!
//! One mutex per cache instance guards the entry map, the eviction queue and
//! the byte accounting. Client-count changes are atomic with respect to
//! eviction because they happen under the same lock. Values are released
//! outside the lock so a value drop can run arbitrary host code (pool
//! release) without re-entering the cache.
//!
//! # Ownership
//!
//! `cache`/`get` return a [`CacheLease`]: the caller's own reference. Clone
//! to share it, drop to release it. An entry becomes evictable only when
//! every lease for it is gone; the cache's retained reference is released by
//! eviction or removal.

use log::{debug, trace, warn};
use lru::LruCache;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::core::params::{DefaultTrimStrategy, MemoryCacheParams, MemoryPressure, TrimStrategy};

/// Values storable in the counting cache.
///
/// Clones must share the underlying storage (reference-counted), so a clone
/// handed to a caller stays usable after the entry itself is evicted.
pub trait Cached: Clone {
    fn size_in_bytes(&self) -> usize;

    fn is_valid(&self) -> bool {
        true
    }
}

/// Hit/miss counters for monitoring cache performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

type ParamsSupplier = Box<dyn Fn() -> MemoryCacheParams + Send>;

struct Entry<V> {
    value: V,
    size: usize,
    /// Live external leases; 0 means the entry sits in the eviction queue
    client_count: usize,
    /// Distinguishes this entry from any later entry under the same key,
    /// so a stale lease release can never corrupt a replacement
    generation: u64,
}

struct CacheInner<K: Hash + Eq + Clone, V: Cached> {
    entries: HashMap<K, Entry<V>>,
    /// Unshared entries in LRU order, value = entry size
    exclusives: LruCache<K, usize>,
    size_bytes: usize,
    exclusive_bytes: usize,
    params: MemoryCacheParams,
    params_supplier: Option<ParamsSupplier>,
    params_refreshed_at: Instant,
    next_generation: u64,
}

impl<K: Hash + Eq + Clone, V: Cached> CacheInner<K, V> {
    /// Re-consult the params supplier at most once per refresh interval
    fn maybe_refresh_params(&mut self, dropped: &mut Vec<V>) {
        let Some(supplier) = self.params_supplier.as_ref() else {
            return;
        };
        if (self.params_refreshed_at.elapsed().as_millis() as u64)
            < self.params.params_refresh_interval_ms
        {
            return;
        }
        let fresh = supplier();
        self.params_refreshed_at = Instant::now();
        if fresh != self.params {
            debug!(
                "cache params refreshed: {} -> {} byte budget",
                self.params.max_cache_size_bytes, fresh.max_cache_size_bytes
            );
            self.params = fresh;
            self.evict_to_budget(0, 0, dropped);
            self.evict_queue_overflow(dropped);
        }
    }

    /// Pop the least-recently-used unshared entry
    fn evict_lru(&mut self) -> Option<(usize, V)> {
        while let Some((key, queued_size)) = self.exclusives.pop_lru() {
            if let Some(entry) = self.entries.remove(&key) {
                self.size_bytes -= entry.size;
                self.exclusive_bytes -= entry.size;
                trace!("evicted LRU entry ({} bytes)", entry.size);
                return Some((entry.size, entry.value));
            }
            // queue and map are updated together; tolerate a stray key anyway
            self.exclusive_bytes = self.exclusive_bytes.saturating_sub(queued_size);
        }
        None
    }

    /// Evict unshared entries until the incoming insert fits the budgets.
    /// Stops early when only shared entries remain: in-use content is never
    /// evicted, the insert proceeds over budget instead.
    fn evict_to_budget(&mut self, incoming_bytes: usize, incoming_entries: usize, dropped: &mut Vec<V>) {
        while self.size_bytes + incoming_bytes > self.params.max_cache_size_bytes
            || self.entries.len() + incoming_entries > self.params.max_cache_entries
        {
            match self.evict_lru() {
                Some((_, value)) => dropped.push(value),
                None => break,
            }
        }
    }

    /// Keep the eviction queue itself inside its byte/entry budget
    fn evict_queue_overflow(&mut self, dropped: &mut Vec<V>) {
        while self.exclusive_bytes > self.params.max_eviction_queue_size_bytes
            || self.exclusives.len() > self.params.max_eviction_queue_entries
        {
            match self.evict_lru() {
                Some((_, value)) => dropped.push(value),
                None => break,
            }
        }
    }

    /// Remove one entry unconditionally, fixing all accounting
    fn remove_entry(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.size_bytes -= entry.size;
        if entry.client_count == 0 && self.exclusives.pop(key).is_some() {
            self.exclusive_bytes -= entry.size;
        }
        Some(entry)
    }
}

struct CacheShared<K: Hash + Eq + Clone, V: Cached> {
    inner: Mutex<CacheInner<K, V>>,
    trim_strategy: Box<dyn TrimStrategy>,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V: Cached> CacheShared<K, V> {
    /// A lease went away: decrement, and queue the entry for eviction when
    /// it was the last client.
    fn release_client(&self, key: &K, generation: u64) {
        let mut dropped = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let became_idle = match inner.entries.get_mut(key) {
                Some(entry) if entry.generation == generation && entry.client_count > 0 => {
                    entry.client_count -= 1;
                    (entry.client_count == 0).then_some(entry.size)
                }
                // entry gone or replaced: the lease's own clone was the last tie
                _ => None,
            };
            if let Some(size) = became_idle {
                inner.exclusives.put(key.clone(), size);
                inner.exclusive_bytes += size;
                inner.evict_queue_overflow(&mut dropped);
            }
        }
        drop(dropped);
    }

    /// A lease was cloned: another client for the same entry, if it still
    /// exists in this generation.
    fn clone_client(&self, key: &K, generation: u64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.get_mut(key) {
            Some(entry) if entry.generation == generation && entry.client_count > 0 => {
                entry.client_count += 1;
                true
            }
            _ => false,
        }
    }
}

struct LeaseSlot<K: Hash + Eq + Clone, V: Cached> {
    shared: Arc<CacheShared<K, V>>,
    key: K,
    generation: u64,
}

/// The caller's reference to a cached value.
///
/// Dereferences to the value. Dropping releases the client count exactly
/// once; cloning registers another client. A lease may be *detached*
/// (oversized entries, or clones of a replaced entry): it still carries a
/// working value, the cache just holds nothing behind it.
pub struct CacheLease<K: Hash + Eq + Clone, V: Cached> {
    value: V,
    slot: Option<LeaseSlot<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Cached> CacheLease<K, V> {
    pub fn is_detached(&self) -> bool {
        self.slot.is_none()
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<K: Hash + Eq + Clone, V: Cached> Deref for CacheLease<K, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<K: Hash + Eq + Clone, V: Cached> Clone for CacheLease<K, V> {
    fn clone(&self) -> Self {
        let slot = self.slot.as_ref().and_then(|s| {
            s.shared.clone_client(&s.key, s.generation).then(|| LeaseSlot {
                shared: Arc::clone(&s.shared),
                key: s.key.clone(),
                generation: s.generation,
            })
        });
        Self {
            value: self.value.clone(),
            slot,
        }
    }
}

impl<K: Hash + Eq + Clone, V: Cached> Drop for CacheLease<K, V> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.shared.release_client(&slot.key, slot.generation);
        }
    }
}

/// Reference-counted, size-bounded key-value cache with LRU eviction of
/// unshared entries and a pressure-driven trim path.
pub struct BoundedCache<K: Hash + Eq + Clone, V: Cached> {
    shared: Arc<CacheShared<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Cached> Clone for BoundedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Cached> BoundedCache<K, V> {
    pub fn new(params: MemoryCacheParams) -> Self {
        Self::build(params, None, Box::new(DefaultTrimStrategy))
    }

    /// Params are re-read from `supplier` at most once per refresh interval
    pub fn with_supplier(
        supplier: impl Fn() -> MemoryCacheParams + Send + 'static,
        trim_strategy: Box<dyn TrimStrategy>,
    ) -> Self {
        let params = supplier();
        Self::build(params, Some(Box::new(supplier)), trim_strategy)
    }

    fn build(
        params: MemoryCacheParams,
        params_supplier: Option<ParamsSupplier>,
        trim_strategy: Box<dyn TrimStrategy>,
    ) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                inner: Mutex::new(CacheInner {
                    entries: HashMap::new(),
                    exclusives: LruCache::unbounded(),
                    size_bytes: 0,
                    exclusive_bytes: 0,
                    params,
                    params_supplier,
                    params_refreshed_at: Instant::now(),
                    next_generation: 0,
                }),
                trim_strategy,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Insert a value and return the caller's lease on it.
    ///
    /// Returns `None` only for invalid values. Oversized values (above
    /// `max_single_entry_bytes`) come back as a detached lease: the caller
    /// keeps a working handle, the cache retains nothing. Any previous entry
    /// under the same key is released after the new one is installed.
    pub fn cache(&self, key: K, value: V) -> Option<CacheLease<K, V>> {
        if !value.is_valid() {
            warn!("rejecting invalid cache value");
            return None;
        }
        let size = value.size_in_bytes();
        let mut dropped = Vec::new();
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.maybe_refresh_params(&mut dropped);

        if size > inner.params.max_single_entry_bytes {
            debug!("entry too large to retain ({} bytes), handing back detached", size);
            drop(inner);
            drop(dropped);
            return Some(CacheLease { value, slot: None });
        }

        inner.evict_to_budget(size, 1, &mut dropped);

        let generation = inner.next_generation;
        inner.next_generation += 1;
        let previous = inner.entries.insert(
            key.clone(),
            Entry {
                value: value.clone(),
                size,
                client_count: 1,
                generation,
            },
        );
        inner.size_bytes += size;
        if let Some(prev) = &previous {
            inner.size_bytes -= prev.size;
            if prev.client_count == 0 && inner.exclusives.pop(&key).is_some() {
                inner.exclusive_bytes -= prev.size;
            }
        }
        drop(inner);
        // replaced value released only after the new entry is installed
        drop(previous);
        drop(dropped);

        Some(CacheLease {
            value,
            slot: Some(LeaseSlot {
                shared: Arc::clone(&self.shared),
                key,
                generation,
            }),
        })
    }

    /// Look up a value, bumping recency and registering the caller as a
    /// client. Invalid entries are dropped on sight.
    pub fn get(&self, key: &K) -> Option<CacheLease<K, V>> {
        let mut dropped = Vec::new();
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.maybe_refresh_params(&mut dropped);

        let stale = matches!(inner.entries.get(key), Some(e) if !e.value.is_valid());
        if stale {
            let removed = inner.remove_entry(key);
            drop(inner);
            drop(removed);
            drop(dropped);
            self.shared.stats.record_miss();
            return None;
        }

        let hit = inner.entries.get_mut(key).map(|entry| {
            entry.client_count += 1;
            (
                entry.value.clone(),
                entry.generation,
                entry.client_count == 1,
                entry.size,
            )
        });

        let lease = match hit {
            None => {
                self.shared.stats.record_miss();
                None
            }
            Some((value, generation, first_client, size)) => {
                if first_client && inner.exclusives.pop(key).is_some() {
                    inner.exclusive_bytes -= size;
                }
                self.shared.stats.record_hit();
                Some(CacheLease {
                    value,
                    slot: Some(LeaseSlot {
                        shared: Arc::clone(&self.shared),
                        key: key.clone(),
                        generation,
                    }),
                })
            }
        };
        drop(inner);
        drop(dropped);
        lease
    }

    /// Diagnostic peek: no recency bump, no client registration, no stats
    pub fn inspect(&self, key: &K) -> Option<V> {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .get(key)
            .filter(|e| e.value.is_valid())
            .map(|e| e.value.clone())
    }

    /// Touch recency without returning data
    pub fn probe(&self, key: &K) {
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        // shared entries sit outside the queue; nothing to bump for them
        let _ = inner.exclusives.get(key);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.contains_key(key)
    }

    pub fn contains(&self, predicate: impl Fn(&K) -> bool) -> bool {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.keys().any(|k| predicate(k))
    }

    /// Remove every entry whose key matches. Outstanding leases keep their
    /// clones working; their eventual release is a no-op.
    pub fn remove_all(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<K> = inner.entries.keys().filter(|k| predicate(k)).cloned().collect();
        let mut removed = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(entry) = inner.remove_entry(key) {
                removed.push(entry);
            }
        }
        let count = removed.len();
        drop(inner);
        drop(removed);
        if count > 0 {
            debug!("removed {} cache entries", count);
        }
        count
    }

    pub fn clear(&self) {
        self.remove_all(|_| true);
    }

    pub fn count(&self) -> usize {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.size_bytes
    }

    /// Entries currently eligible for eviction
    pub fn eviction_queue_count(&self) -> usize {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.exclusives.len()
    }

    pub fn eviction_queue_bytes(&self) -> usize {
        let inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.exclusive_bytes
    }

    /// React to an external memory-pressure signal: evict
    /// `ceil(eviction_queue_bytes * ratio)` bytes of idle entries,
    /// least-recently-used first. Shared entries are untouched.
    pub fn trim(&self, pressure: MemoryPressure) {
        let mut dropped = Vec::new();
        let freed;
        let target;
        {
            let mut inner = self.shared.inner.lock().unwrap_or_else(|e| e.into_inner());
            let ratio = self.shared.trim_strategy.trim_ratio(pressure).clamp(0.0, 1.0);
            target = (inner.exclusive_bytes as f64 * ratio).ceil() as usize;
            let mut bytes = 0usize;
            while bytes < target {
                match inner.evict_lru() {
                    Some((size, value)) => {
                        bytes += size;
                        dropped.push(value);
                    }
                    None => break,
                }
            }
            freed = bytes;
        }
        drop(dropped);
        debug!("trim {:?}: freed {} of {} requested bytes", pressure, freed, target);
    }

    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Blob {
        id: u32,
        size: usize,
        valid: bool,
    }

    impl Cached for Blob {
        fn size_in_bytes(&self) -> usize {
            self.size
        }

        fn is_valid(&self) -> bool {
            self.valid
        }
    }

    fn blob(id: u32, size: usize) -> Blob {
        Blob {
            id,
            size,
            valid: true,
        }
    }

    fn small_params() -> MemoryCacheParams {
        MemoryCacheParams {
            max_cache_size_bytes: 100,
            max_cache_entries: 10,
            max_eviction_queue_size_bytes: 100,
            max_eviction_queue_entries: 10,
            max_single_entry_bytes: 50,
            params_refresh_interval_ms: 60_000,
        }
    }

    #[test]
    fn test_cache_and_get() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        let lease = cache.cache(1, blob(1, 10)).unwrap();
        assert!(!lease.is_detached());
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.size_in_bytes(), 10);

        let hit = cache.get(&1).unwrap();
        assert_eq!(hit.id, 1);
        assert!(cache.get(&2).is_none());

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    /// Test: entries enter the eviction queue only when the last lease drops
    #[test]
    fn test_lease_release_queues_entry() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        let lease = cache.cache(1, blob(1, 10)).unwrap();
        assert_eq!(cache.eviction_queue_count(), 0);

        let clone = lease.clone();
        drop(lease);
        assert_eq!(cache.eviction_queue_count(), 0);

        drop(clone);
        assert_eq!(cache.eviction_queue_count(), 1);
        assert_eq!(cache.eviction_queue_bytes(), 10);
    }

    /// Test: shared entries are never evicted, even over budget
    #[test]
    fn test_eviction_respects_sharing() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(MemoryCacheParams {
            max_single_entry_bytes: 80,
            ..small_params()
        });

        let lease_a = cache.cache(1, blob(1, 60)).unwrap();
        let lease_b = cache.cache(2, blob(2, 60)).unwrap();

        // both shared: the insert went over budget rather than evict in-use data
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.size_in_bytes(), 120);

        drop(lease_a);
        let _lease_c = cache.cache(3, blob(3, 40)).unwrap();

        // entry 1 was idle and went first; entry 2 is still shared
        assert!(!cache.contains_key(&1));
        assert!(cache.contains_key(&2));
        drop(lease_b);
    }

    /// Test: least-recently-used idle entry goes first
    #[test]
    fn test_lru_eviction_order() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        drop(cache.cache(1, blob(1, 40)));
        drop(cache.cache(2, blob(2, 40)));

        // touch 1 so 2 becomes the oldest
        drop(cache.get(&1));

        drop(cache.cache(3, blob(3, 40)));
        assert!(cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert!(cache.contains_key(&3));
    }

    /// Test: oversized values are never retained, caller still gets a handle
    #[test]
    fn test_oversized_entry_detached() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        let lease = cache.cache(1, blob(1, 60)).unwrap();
        assert!(lease.is_detached());
        assert_eq!(lease.id, 1);
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.size_in_bytes(), 0);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());
        let bad = Blob {
            id: 1,
            size: 10,
            valid: false,
        };
        assert!(cache.cache(1, bad).is_none());
        assert_eq!(cache.count(), 0);
    }

    /// Test: a stale lease from a replaced entry cannot corrupt the new one
    #[test]
    fn test_replacement_generation_safety() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        let lease_v1 = cache.cache(1, blob(1, 10)).unwrap();
        let lease_v2 = cache.cache(1, blob(2, 20)).unwrap();
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.size_in_bytes(), 20);

        // stale release: v2 still has a client, so nothing becomes evictable
        drop(lease_v1);
        assert_eq!(cache.eviction_queue_count(), 0);

        drop(lease_v2);
        assert_eq!(cache.eviction_queue_count(), 1);
    }

    /// Test: re-caching the identical payload leaves totals unchanged
    #[test]
    fn test_recache_idempotent_size() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());

        drop(cache.cache(1, blob(1, 30)));
        drop(cache.cache(1, blob(1, 30)));

        assert_eq!(cache.count(), 1);
        assert_eq!(cache.size_in_bytes(), 30);
        assert_eq!(cache.eviction_queue_count(), 1);
        assert_eq!(cache.eviction_queue_bytes(), 30);
    }

    #[test]
    fn test_remove_all_predicate() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());
        drop(cache.cache(1, blob(1, 10)));
        drop(cache.cache(2, blob(2, 10)));
        drop(cache.cache(3, blob(3, 10)));

        let removed = cache.remove_all(|k| *k < 3);
        assert_eq!(removed, 2);
        assert_eq!(cache.count(), 1);
        assert!(cache.contains_key(&3));
        assert!(cache.contains(|k| *k == 3));
        assert!(!cache.contains(|k| *k == 1));
    }

    /// Test: trim evicts by ratio from the idle queue, oldest first,
    /// and never touches shared entries
    #[test]
    fn test_trim_by_pressure() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());
        for id in 1..=4 {
            drop(cache.cache(id, blob(id, 20)));
        }
        let shared = cache.cache(5, blob(5, 20)).unwrap();
        assert_eq!(cache.eviction_queue_bytes(), 80);

        cache.trim(MemoryPressure::Moderate);
        assert_eq!(cache.eviction_queue_bytes(), 40);
        assert!(!cache.contains_key(&1));
        assert!(!cache.contains_key(&2));

        cache.trim(MemoryPressure::Critical);
        assert_eq!(cache.eviction_queue_bytes(), 0);
        assert!(cache.contains_key(&5));
        drop(shared);
    }

    /// Test: concurrent cache/get/release from many threads leaves the
    /// accounting consistent
    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let cache: BoundedCache<u32, Blob> = BoundedCache::new(MemoryCacheParams {
            max_cache_size_bytes: 10_000,
            max_cache_entries: 1000,
            max_eviction_queue_size_bytes: 10_000,
            max_eviction_queue_entries: 1000,
            max_single_entry_bytes: 100,
            params_refresh_interval_ms: 60_000,
        });
        let mut handles = vec![];

        for t in 0..8u32 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                for i in 0..50u32 {
                    let key = t * 100 + i;
                    let lease = cache.cache(key, blob(key, 8)).unwrap();
                    let hit = cache.get(&key);
                    drop(hit);
                    drop(lease);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // every entry idle again: the queue covers the whole cache
        assert_eq!(cache.count(), 400);
        assert_eq!(cache.eviction_queue_count(), 400);
        assert_eq!(cache.size_in_bytes(), 400 * 8);
    }

    #[test]
    fn test_inspect_and_probe_do_not_register_clients() {
        let cache: BoundedCache<u32, Blob> = BoundedCache::new(small_params());
        drop(cache.cache(1, blob(1, 10)));

        let peeked = cache.inspect(&1).unwrap();
        assert_eq!(peeked.id, 1);
        // still idle: inspect registered no client
        assert_eq!(cache.eviction_queue_count(), 1);

        cache.probe(&1);
        assert_eq!(cache.eviction_queue_count(), 1);
        assert_eq!(cache.stats().total(), 0);
    }
}
