//! Insertion-ordered bounded map and set.
//!
//! Both collections hold up to `capacity` entries ordered by time of insertion.
//! Inserting into a full collection evicts the oldest entry and hands it back to
//! the caller. Re-inserting an existing key makes it the newest. A collection
//! with zero capacity rejects every insertion by returning the inserted entry.
//!
//! Lookups never change the ordering, so the eviction order is strictly
//! insertion order rather than access order.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Bounded key-value map evicting the oldest-inserted pair.
pub struct LruMap<K: Hash + Eq, V> {
    cache: Option<LruCache<K, V>>,
}

impl<K: Hash + Eq, V> LruMap<K, V> {
    /// Create a map holding at most `capacity` pairs.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Get the value associated with `key` without refreshing its age.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.cache.as_ref().and_then(|cache| cache.peek(key))
    }

    /// Associate `value` with `key`; the pair becomes the newest.
    ///
    /// Returns the evicted pair if the map was at capacity. With zero
    /// capacity nothing is stored and the given pair is returned unchanged.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        let Some(cache) = self.cache.as_mut() else {
            return Some((key, value));
        };
        cache.pop(&key);
        cache.push(key, value)
    }

    /// Remove the pair for `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.cache.as_mut().and_then(|cache| cache.pop(key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.cache
            .as_ref()
            .map_or(false, |cache| cache.contains(key))
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.cap().get())
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    /// Iterate from the newest to the oldest pair.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.cache.iter().flat_map(|cache| cache.iter())
    }
}

/// Bounded set evicting the oldest-inserted element.
pub struct LruSet<T: Hash + Eq> {
    map: LruMap<T, ()>,
}

impl<T: Hash + Eq> LruSet<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: LruMap::new(capacity),
        }
    }

    /// Insert `element` as the newest member.
    ///
    /// Returns the evicted element when the set was full, or `element` itself
    /// when the capacity is zero.
    pub fn add(&mut self, element: T) -> Option<T> {
        self.map.set(element, ()).map(|(evicted, ())| evicted)
    }

    /// Remove `element`, returning whether it was present.
    pub fn remove(&mut self, element: &T) -> bool {
        self.map.remove(element).is_some()
    }

    pub fn contains(&self, element: &T) -> bool {
        self.map.contains(element)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.iter().map(|(element, _)| element)
    }
}
