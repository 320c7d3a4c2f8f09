//! Cross-request results cache.
//!
//! A [`ResultsCache`] memoizes a connector's mapped fetch results keyed by
//! the connector-computed [`CacheKey`]. One cache instance belongs to one
//! connector, so the `(connector, key)` pair of the conceptual model is
//! implicit.
//!
//! This is the single piece of shared *mutable* state in the decision core
//! and must support concurrent get/put. Reads are read-through: a miss
//! triggers a fetch and a subsequent `put`; two requests racing on one key
//! may both fetch, and the last write wins — at-most-one-fetch-per-key is
//! deliberately not provided.
//!
//! Eviction combines a bounded SIEVE scan with per-entry TTL. SIEVE keeps
//! O(1) operations with a better hit rate than LRU: hits set a `visited`
//! bit; a full insert scans from the `hand`, resetting `visited` bits until
//! it finds a cold entry to evict. Expired entries are dropped lazily on
//! `get`.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use garnet_types::{Attribute, AttributeId};

// ============================================================================
// CacheKey
// ============================================================================

/// A value computed from request facts identifying a reusable fetch result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// ResultsCache
// ============================================================================

/// Mapped connector results, as stored in the cache.
pub(crate) type CachedAttributes = BTreeMap<AttributeId, Attribute>;

#[derive(Debug, Clone)]
struct CachedEntry {
    key: CacheKey,
    inserted_at: Instant,
    attributes: CachedAttributes,
    visited: bool,
}

#[derive(Debug)]
struct Store {
    /// Circular buffer of entries.
    entries: Vec<Option<CachedEntry>>,
    /// Maps keys to their index in `entries`.
    index: HashMap<CacheKey, usize>,
    /// Current hand position for the SIEVE scan.
    hand: usize,
    len: usize,
}

/// Bounded, TTL-aware memo of a connector's mapped fetch results.
#[derive(Debug)]
pub struct ResultsCache {
    capacity: usize,
    ttl: Option<Duration>,
    store: Mutex<Store>,
}

impl ResultsCache {
    /// Creates a cache holding at most `capacity` entries, without TTL.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "results cache capacity must be > 0");
        Self {
            capacity,
            ttl: None,
            store: Mutex::new(Store {
                entries: (0..capacity).map(|_| None).collect(),
                index: HashMap::with_capacity(capacity),
                hand: 0,
                len: 0,
            }),
        }
    }

    /// Sets a time-to-live after which entries expire.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns the cached result for `key`, if present and unexpired.
    /// Expired entries are removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<CachedAttributes> {
        let mut store = self.store.lock().expect("results cache lock poisoned");
        let &idx = store.index.get(key)?;

        let expired = match &store.entries[idx] {
            Some(entry) => self
                .ttl
                .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl),
            None => return None,
        };
        if expired {
            store.index.remove(key);
            store.entries[idx] = None;
            store.len -= 1;
            return None;
        }

        let entry = store.entries[idx].as_mut()?;
        entry.visited = true;
        Some(entry.attributes.clone())
    }

    /// Stores a result, evicting if at capacity. Racing puts on the same key
    /// are last-write-wins.
    pub fn put(&self, key: CacheKey, attributes: CachedAttributes) {
        let mut store = self.store.lock().expect("results cache lock poisoned");
        let now = Instant::now();

        // Existing key: update in place.
        if let Some(&idx) = store.index.get(&key) {
            if let Some(entry) = &mut store.entries[idx] {
                entry.attributes = attributes;
                entry.inserted_at = now;
                entry.visited = true;
                return;
            }
        }

        // Below capacity: take a free slot.
        if store.len < self.capacity {
            for i in 0..self.capacity {
                if store.entries[i].is_none() {
                    store.entries[i] = Some(CachedEntry {
                        key: key.clone(),
                        inserted_at: now,
                        attributes,
                        visited: false,
                    });
                    store.index.insert(key, i);
                    store.len += 1;
                    return;
                }
            }
        }

        // At capacity: SIEVE eviction scan.
        let evict_idx = Self::find_eviction_target(&mut store, self.capacity);
        if let Some(old) = &store.entries[evict_idx] {
            let old_key = old.key.clone();
            store.index.remove(&old_key);
        }
        store.entries[evict_idx] = Some(CachedEntry {
            key: key.clone(),
            inserted_at: now,
            attributes,
            visited: false,
        });
        store.index.insert(key, evict_idx);
    }

    /// Removes a single key.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut store = self.store.lock().expect("results cache lock poisoned");
        if let Some(idx) = store.index.remove(key) {
            if store.entries[idx].take().is_some() {
                store.len -= 1;
            }
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut store = self.store.lock().expect("results cache lock poisoned");
        store.index.clear();
        for slot in &mut store.entries {
            *slot = None;
        }
        store.len = 0;
        store.hand = 0;
    }

    /// Number of live entries (including any not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.store.lock().expect("results cache lock poisoned").len
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scans from `hand` for an entry with `visited == false`, resetting
    /// `visited` bits along the way. Bounded at two full passes.
    fn find_eviction_target(store: &mut Store, capacity: usize) -> usize {
        let max_iterations = capacity * 2;

        for _ in 0..max_iterations {
            let hand = store.hand;
            match &mut store.entries[hand] {
                Some(entry) if entry.visited => {
                    entry.visited = false;
                    store.hand = (hand + 1) % capacity;
                }
                _ => {
                    store.hand = (hand + 1) % capacity;
                    return hand;
                }
            }
        }

        let target = store.hand;
        store.hand = (store.hand + 1) % capacity;
        target
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn result_of(id: &str, value: &str) -> CachedAttributes {
        let mut map = BTreeMap::new();
        map.insert(
            AttributeId::from(id),
            Attribute::of_strings(id, [value.to_string()]),
        );
        map
    }

    #[test]
    fn basic_put_and_get() {
        let cache = ResultsCache::new(4);
        cache.put(CacheKey::from("alice"), result_of("mail", "alice@example.org"));

        let hit = cache.get(&CacheKey::from("alice")).expect("cache hit");
        assert!(hit.contains_key(&AttributeId::from("mail")));
        assert!(cache.get(&CacheKey::from("bob")).is_none());
    }

    #[test]
    fn put_is_last_write_wins() {
        let cache = ResultsCache::new(2);
        let key = CacheKey::from("alice");
        cache.put(key.clone(), result_of("mail", "old@example.org"));
        cache.put(key.clone(), result_of("mail", "new@example.org"));

        let hit = cache.get(&key).expect("cache hit");
        let attr = hit.get(&AttributeId::from("mail")).expect("mail present");
        assert_eq!(
            attr.values()[0],
            garnet_types::AttributeValue::string("new@example.org")
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_prefers_unvisited_entries() {
        let cache = ResultsCache::new(3);
        cache.put(CacheKey::from("a"), result_of("x", "1"));
        cache.put(CacheKey::from("b"), result_of("x", "2"));
        cache.put(CacheKey::from("c"), result_of("x", "3"));

        // Touch a and c; b stays cold.
        cache.get(&CacheKey::from("a"));
        cache.get(&CacheKey::from("c"));

        cache.put(CacheKey::from("d"), result_of("x", "4"));

        assert!(cache.get(&CacheKey::from("a")).is_some());
        assert!(cache.get(&CacheKey::from("b")).is_none(), "cold entry evicted");
        assert!(cache.get(&CacheKey::from("c")).is_some());
        assert!(cache.get(&CacheKey::from("d")).is_some());
    }

    #[test]
    fn ttl_expires_entries_lazily() {
        let cache = ResultsCache::new(2).with_ttl(Duration::from_millis(10));
        cache.put(CacheKey::from("alice"), result_of("mail", "a@example.org"));
        assert!(cache.get(&CacheKey::from("alice")).is_some());

        thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&CacheKey::from("alice")).is_none(), "entry expired");
        assert_eq!(cache.len(), 0, "expired entry collected on get");
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ResultsCache::new(3);
        cache.put(CacheKey::from("a"), result_of("x", "1"));
        cache.put(CacheKey::from("b"), result_of("x", "2"));

        cache.invalidate(&CacheKey::from("a"));
        assert!(cache.get(&CacheKey::from("a")).is_none());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&CacheKey::from("b")).is_none());
    }

    #[test]
    fn concurrent_get_put_is_safe() {
        let cache = std::sync::Arc::new(ResultsCache::new(8));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = std::sync::Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let key = CacheKey::from(format!("key-{}", i % 8));
                    cache.put(key.clone(), result_of("x", &format!("{t}-{i}")));
                    let _ = cache.get(&key);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }
        assert!(cache.len() <= 8);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _cache = ResultsCache::new(0);
    }
}
