//! Byte-budgeted LRU list.
//!
//! Entries are kept most-recently-used first. A hit on an entry that sits
//! within the first `promotion_threshold` positions leaves the list alone;
//! anything further back is moved to the front. Insertions evict from the
//! back until the new entry fits the budget.
//!
//! The list itself is not synchronized; every cache wraps it in a mutex.

use std::collections::VecDeque;
use std::time::Instant;
use tracing::trace;

/// One cached value and its accounted size.
#[derive(Debug)]
pub struct LruEntry<K, V> {
    pub key: K,
    pub value: V,
    pub size: usize,
    pub created_at: Instant,
}

/// Counters reported by every cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub budget_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0 when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct LruList<K, V> {
    entries: VecDeque<LruEntry<K, V>>,
    budget: usize,
    used: usize,
    promotion_threshold: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: PartialEq + std::fmt::Debug, V> LruList<K, V> {
    pub fn new(budget: usize, promotion_threshold: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            budget,
            used: 0,
            promotion_threshold,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up `key`, counting a hit or miss and promoting on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.find(|k| k == key)
    }

    /// First entry (in recency order) whose key satisfies `pred`, promoted
    /// like [`get`](Self::get).
    pub fn find(&mut self, mut pred: impl FnMut(&K) -> bool) -> Option<&V> {
        let Some(pos) = self.entries.iter().position(|e| pred(&e.key)) else {
            self.misses += 1;
            return None;
        };
        self.hits += 1;
        let pos = self.promote(pos);
        self.entries.get(pos).map(|e| &e.value)
    }

    /// Look up without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|e| &e.key == key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Current index of `key` counted from the most recent entry.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    /// Insert or replace `key`, evicting from the back until it fits.
    ///
    /// Returns the evicted keys, oldest first, or `None` when the value is
    /// larger than the whole budget (nothing is inserted or evicted then).
    pub fn insert(&mut self, key: K, value: V, size: usize) -> Option<Vec<K>> {
        if size > self.budget {
            trace!(?key, size, budget = self.budget, "entry larger than cache budget");
            return None;
        }
        self.remove(&key);

        let mut evicted = Vec::new();
        while self.used + size > self.budget {
            let Some(tail) = self.entries.pop_back() else {
                break;
            };
            self.used -= tail.size;
            self.evictions += 1;
            trace!(key = ?tail.key, size = tail.size, "evicted");
            evicted.push(tail.key);
        }

        self.used += size;
        self.entries.push_front(LruEntry {
            key,
            value,
            size,
            created_at: Instant::now(),
        });
        Some(evicted)
    }

    /// Insert only when `key` is not cached yet. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, key: K, value: V, size: usize) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.insert(key, value, size).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.position(key)?;
        let entry = self.entries.remove(pos)?;
        self.used -= entry.size;
        Some(entry.value)
    }

    /// Keep only the entries for which `keep` returns true. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        let mut used = 0;
        self.entries.retain(|e| {
            let kept = keep(&e.key);
            if kept {
                used += e.size;
            }
            kept
        });
        self.used = used;
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.used = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LruEntry<K, V>> {
        self.entries.iter()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            used_bytes: self.used,
            budget_bytes: self.budget,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn promote(&mut self, pos: usize) -> usize {
        if pos < self.promotion_threshold {
            return pos;
        }
        match self.entries.remove(pos) {
            Some(entry) => {
                self.entries.push_front(entry);
                0
            }
            None => pos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(list: &LruList<u32, ()>) -> Vec<u32> {
        list.keys().copied().collect()
    }

    #[test]
    fn test_insert_evicts_tail_first() {
        let mut list = LruList::new(30, 0);
        list.insert(1, (), 10);
        list.insert(2, (), 10);
        list.insert(3, (), 10);
        let evicted = list.insert(4, (), 15).unwrap();
        assert_eq!(evicted, vec![1, 2]);
        assert_eq!(keys(&list), vec![4, 3]);
        assert_eq!(list.used_bytes(), 25);
    }

    #[test]
    fn test_oversized_entry_is_refused() {
        let mut list = LruList::new(10, 0);
        list.insert(1, (), 5);
        assert!(list.insert(2, (), 11).is_none());
        assert_eq!(keys(&list), vec![1]);
    }

    #[test]
    fn test_hit_beyond_threshold_moves_to_front() {
        let mut list = LruList::new(100, 2);
        for k in 0..5 {
            list.insert(k, (), 1);
        }
        // Order is 4 3 2 1 0; key 1 sits at position 3.
        assert_eq!(list.position(&1), Some(3));
        assert!(list.get(&1).is_some());
        assert_eq!(list.position(&1), Some(0));
    }

    #[test]
    fn test_hit_within_threshold_stays_put() {
        let mut list = LruList::new(100, 2);
        for k in 0..5 {
            list.insert(k, (), 1);
        }
        assert_eq!(list.position(&3), Some(1));
        assert!(list.get(&3).is_some());
        assert_eq!(list.position(&3), Some(1));
        assert_eq!(keys(&list), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_replace_updates_size() {
        let mut list = LruList::new(100, 0);
        list.insert(1, 'a', 10);
        list.insert(1, 'b', 20);
        assert_eq!(list.len(), 1);
        assert_eq!(list.used_bytes(), 20);
        assert_eq!(list.peek(&1), Some(&'b'));
    }

    #[test]
    fn test_retain_recomputes_usage() {
        let mut list = LruList::new(100, 0);
        for k in 0..6u32 {
            list.insert(k, (), 5);
        }
        assert_eq!(list.retain(|k| k % 2 == 0), 3);
        assert_eq!(list.used_bytes(), 15);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let mut list = LruList::new(100, 0);
        list.insert(1, (), 1);
        list.get(&1);
        list.get(&2);
        let stats = list.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_budget_never_exceeded(
            ops in prop::collection::vec((0u32..16, 1usize..40, any::<bool>()), 1..200)
        ) {
            let mut list = LruList::new(100, 3);
            for (key, size, lookup) in ops {
                if lookup {
                    list.get(&key);
                } else {
                    list.insert(key, (), size);
                }
                prop_assert!(list.used_bytes() <= list.budget());
                let sum: usize = list.entries().map(|e| e.size).sum();
                prop_assert_eq!(sum, list.used_bytes());
            }
        }

        #[test]
        fn prop_eviction_takes_least_recent(
            sizes in prop::collection::vec(1usize..30, 2..50)
        ) {
            let mut list = LruList::new(60, 0);
            for (key, size) in sizes.into_iter().enumerate() {
                let before: Vec<usize> = list.keys().copied().collect();
                if let Some(evicted) = list.insert(key, (), size) {
                    // Evicted keys are exactly the oldest suffix of the previous order.
                    let tail: Vec<usize> = before.iter().rev().take(evicted.len()).copied().collect();
                    prop_assert_eq!(evicted, tail);
                }
            }
        }
    }
}
