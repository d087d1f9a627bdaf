//! Bounded cache for values that go stale, such as tokens scraped from a
//! provider's landing page.
//!
//! # Design
//! The cache is an ordinary owned value. Callers that share one across
//! threads wrap it in a `Mutex` themselves; nothing here is global.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 100;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Map with a size limit and eviction by age.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    max_age: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_AGE)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            max_age,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Store `value`. When full, expired entries go first, then the oldest.
    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.entries.insert(key, Entry { value, stored_at: now });
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// The value for `key` if it is younger than the max age. Expired
    /// entries are removed on lookup.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) > self.max_age {
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn purge_expired(&mut self, now: Instant) {
        let max_age = self.max_age;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) <= max_age);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_fresh_values() {
        let mut cache = TtlCache::default();
        cache.insert("bing", "token-1".to_string());
        assert_eq!(cache.get(&"bing").as_deref(), Some("token-1"));
        assert_eq!(cache.get(&"google"), None);
    }

    #[test]
    fn expired_values_are_dropped() {
        let start = Instant::now();
        let mut cache = TtlCache::new(4, Duration::from_secs(10));
        cache.insert_at("k", 1, start);
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(10)), Some(1));
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(11)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn never_exceeds_capacity() {
        let start = Instant::now();
        let mut cache = TtlCache::new(3, Duration::from_secs(60));
        for i in 0..10u64 {
            cache.insert_at(i, i, start + Duration::from_secs(i));
            assert!(cache.len() <= 3);
        }
        let now = start + Duration::from_secs(10);
        assert_eq!(cache.get_at(&9, now), Some(9));
        assert_eq!(cache.get_at(&7, now), Some(7));
        assert_eq!(cache.get_at(&0, now), None);
    }

    #[test]
    fn expired_entries_are_evicted_before_fresh_ones() {
        let start = Instant::now();
        let mut cache = TtlCache::new(2, Duration::from_secs(5));
        cache.insert_at("fresh", 1, start + Duration::from_secs(4));
        cache.insert_at("stale", 2, start);
        cache.insert_at("new", 3, start + Duration::from_secs(6));
        let now = start + Duration::from_secs(6);
        assert_eq!(cache.get_at(&"fresh", now), Some(1));
        assert_eq!(cache.get_at(&"new", now), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn overwriting_a_key_does_not_evict() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(3));
        assert_eq!(cache.get(&"b"), Some(2));
    }
}
