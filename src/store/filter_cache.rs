//! Cache of per-term document sets.
//!
//! The enumeration counter turns high-frequency terms into [`DocSet`]s so that
//! their overlap with the base set becomes a bitmap intersection instead of a
//! postings walk. The cache belongs to an index snapshot and lives as long as
//! the snapshot does; entries are evicted least-recently-used once the
//! configured capacity is reached.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::store::doc_set::DocSet;

/// Identifies a cached term set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterKey {
    /// Segment (or top-level view) the document ordinals belong to.
    pub scope: u64,
    /// Field name
    pub field: String,
    /// Term bytes
    pub term: Vec<u8>,
}

impl FilterKey {
    pub fn new(scope: u64, field: &str, term: &[u8]) -> Self {
        FilterKey {
            scope,
            field: field.to_string(),
            term: term.to_vec(),
        }
    }
}

#[derive(Debug)]
struct CacheState {
    entries: AHashMap<FilterKey, (Arc<DocSet>, u64)>,
    tick: u64,
}

/// Bounded LRU cache of term document sets.
#[derive(Debug)]
pub struct FilterCache {
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FilterCache {
    /// Create a cache holding at most `capacity` term sets. A capacity of
    /// zero disables caching: every lookup builds a fresh set.
    pub fn new(capacity: usize) -> Self {
        FilterCache {
            capacity,
            state: Mutex::new(CacheState {
                entries: AHashMap::new(),
                tick: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached set for `key`, building it with `build` on a miss.
    ///
    /// `build` runs without holding the cache lock; two threads missing on
    /// the same key may both build it, the last insert wins.
    pub fn get_or_insert_with<F>(&self, key: FilterKey, build: F) -> Result<Arc<DocSet>>
    where
        F: FnOnce() -> Result<DocSet>,
    {
        {
            let mut state = self.state.lock();
            state.tick += 1;
            let tick = state.tick;
            if let Some((set, last_used)) = state.entries.get_mut(&key) {
                *last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(set));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let set = Arc::new(build()?);
        if self.capacity == 0 {
            return Ok(set);
        }

        let mut state = self.state.lock();
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }
        state.tick += 1;
        let tick = state.tick;
        state.entries.insert(key, (Arc::clone(&set), tick));

        Ok(set)
    }

    /// Number of cached sets.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached set.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to build the set.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        FilterCache::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(docs: &[u32]) -> Result<DocSet> {
        Ok(docs.iter().copied().collect())
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = FilterCache::new(4);
        let key = FilterKey::new(0, "color", b"red");

        let first = cache.get_or_insert_with(key.clone(), || set(&[1, 2])).unwrap();
        let second = cache
            .get_or_insert_with(key, || panic!("should be cached"))
            .unwrap();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = FilterCache::new(2);
        let a = FilterKey::new(0, "f", b"a");
        let b = FilterKey::new(0, "f", b"b");
        let c = FilterKey::new(0, "f", b"c");

        cache.get_or_insert_with(a.clone(), || set(&[1])).unwrap();
        cache.get_or_insert_with(b.clone(), || set(&[2])).unwrap();
        // Touch `a` so that `b` becomes the eviction candidate.
        cache.get_or_insert_with(a.clone(), || set(&[])).unwrap();
        cache.get_or_insert_with(c, || set(&[3])).unwrap();

        assert_eq!(cache.len(), 2);
        let kept = cache
            .get_or_insert_with(a, || panic!("a should still be cached"))
            .unwrap();
        assert!(kept.contains(1));

        let misses = cache.misses();
        let rebuilt = cache.get_or_insert_with(b, || set(&[9])).unwrap();
        assert!(rebuilt.contains(9));
        assert_eq!(cache.misses(), misses + 1);
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = FilterCache::new(0);
        let key = FilterKey::new(3, "f", b"x");

        cache.get_or_insert_with(key.clone(), || set(&[1])).unwrap();
        cache.get_or_insert_with(key, || set(&[1])).unwrap();

        assert!(cache.is_empty());
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_scopes_are_distinct() {
        let cache = FilterCache::new(8);
        cache
            .get_or_insert_with(FilterKey::new(0, "f", b"x"), || set(&[1]))
            .unwrap();
        let other = cache
            .get_or_insert_with(FilterKey::new(1, "f", b"x"), || set(&[5]))
            .unwrap();

        assert!(other.contains(5));
        assert_eq!(cache.len(), 2);
    }
}
