//! Bounded, thread-safe memoization with least-recently-used eviction.
//!
//! Concurrent callers asking for the same key share one build: the first
//! caller claims the key, later callers wait on a condition variable and read
//! the finished entry. The entry map, the recency order and the in-flight set
//! sit behind one mutex so the capacity bound holds under any interleaving. A
//! builder that fails or panics gives its claim back and the next waiter
//! builds instead.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub enabled: bool,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stamp: u64,
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency order: lowest stamp is least recently used.
    order: BTreeMap<u64, K>,
    in_flight: HashSet<K>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn next_stamp(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &K) -> Option<V> {
        let stamp = self.next_stamp();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, key.clone());
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: K, value: V, capacity: usize) {
        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.stamp);
        }
        while self.entries.len() >= capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            self.evictions += 1;
        }
        let stamp = self.next_stamp();
        self.order.insert(stamp, key.clone());
        self.entries.insert(key, Entry { value, stamp });
    }
}

#[derive(Debug)]
pub struct ResultCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    ready: Condvar,
    capacity: usize,
    enabled: AtomicBool,
}

impl<K, V> Default for ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                in_flight: HashSet::new(),
                tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ready: Condvar::new(),
            capacity: capacity.max(1),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Returns the cached value for `key` or runs `build` to produce it. At
    /// most one build per key runs at a time; errors are not cached.
    pub fn get_or_build<E, F>(&self, key: K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !self.is_enabled() {
            return build();
        }

        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.touch(&key) {
                state.hits += 1;
                return Ok(value);
            }
            if !state.in_flight.contains(&key) {
                break;
            }
            self.ready.wait(&mut state);
        }
        state.misses += 1;
        state.in_flight.insert(key.clone());
        drop(state);

        let claim = InFlight { cache: self, key: &key };
        let value = build()?;
        self.state
            .lock()
            .insert(key.clone(), value.clone(), self.capacity);
        drop(claim);
        Ok(value)
    }

    /// Looks a key up without building or refreshing its recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn size_info(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            enabled: self.is_enabled(),
        }
    }
}

/// Releases a build claim and wakes waiters, on success, error or unwind.
struct InFlight<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    cache: &'a ResultCache<K, V>,
    key: &'a K,
}

impl<K, V> Drop for InFlight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        self.cache.state.lock().in_flight.remove(self.key);
        self.cache.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn ok(value: u32) -> Result<u32, ()> {
        Ok(value)
    }

    #[test]
    fn returns_cached_value_on_second_call() {
        let cache = ResultCache::new(4);
        assert_eq!(cache.get_or_build("a", || ok(1)), Ok(1));
        assert_eq!(cache.get_or_build("a", || ok(2)), Ok(1));
        let stats = cache.size_info();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResultCache::new(2);
        cache.get_or_build("a", || ok(1)).unwrap();
        cache.get_or_build("b", || ok(2)).unwrap();
        // refresh "a" so "b" becomes the oldest
        cache.get_or_build("a", || ok(9)).unwrap();
        cache.get_or_build("c", || ok(3)).unwrap();
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.size_info().evictions, 1);
    }

    #[test]
    fn capacity_bound_holds_at_default_size() {
        let cache: ResultCache<u32, u32> = ResultCache::default();
        for key in 0..1001 {
            cache.get_or_build(key, || ok(key)).unwrap();
        }
        let stats = cache.size_info();
        assert!(stats.entries <= 1000);
        assert!(!cache.contains(&0));
        assert!(cache.contains(&1000));
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = ResultCache::new(2);
        assert_eq!(cache.get_or_build("a", || Err::<u32, _>("boom")), Err("boom"));
        assert_eq!(cache.get_or_build("a", || Ok::<_, &str>(5)), Ok(5));
    }

    #[test]
    fn clear_and_disable() {
        let cache = ResultCache::new(2);
        cache.get_or_build(1, || ok(1)).unwrap();
        cache.clear();
        assert_eq!(cache.size_info().entries, 0);

        cache.set_enabled(false);
        cache.get_or_build(2, || ok(2)).unwrap();
        assert!(cache.peek(&2).is_none());
        assert!(!cache.size_info().enabled);
    }

    #[test]
    fn concurrent_callers_share_one_build() {
        let cache = Arc::new(ResultCache::new(8));
        let builds = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    cache
                        .get_or_build("shared", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            ok(7)
                        })
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_builder_releases_claim() {
        let cache = Arc::new(ResultCache::new(2));
        let worker = Arc::clone(&cache);
        let result = thread::spawn(move || {
            let _ = worker.get_or_build("k", || -> Result<u32, ()> { panic!("builder failed") });
        })
        .join();
        assert!(result.is_err());
        assert_eq!(cache.get_or_build("k", || ok(3)), Ok(3));
    }
}
