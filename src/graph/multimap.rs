//! Multi-maps backing the plan graph lookups.
//!
//! [`MultiMap`] is the canonical, single-writer form: values per key are
//! unique and kept sorted, so the content does not depend on insertion order.
//! [`ConcurrentMultiMap`] is the append-only form written by parallel phases;
//! it is reconciled into canonical storage by a single-threaded merge.

use std::{collections::HashMap, hash::Hash};

use dashmap::DashMap;

/// Canonical multi-map with unique, sorted values per key.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    entries: HashMap<K, Vec<V>>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> MultiMap<K, V>
where
    K: Eq + Hash + Copy,
    V: Ord + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for `additional` more keys.
    pub fn reserve(&mut self, additional: usize) {
        self.entries.reserve(additional);
    }

    /// Add a value under `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let values = self.entries.entry(key).or_default();
        match values.binary_search(&value) {
            Ok(_) => false,
            Err(position) => {
                values.insert(position, value);
                true
            }
        }
    }

    /// Values stored under `key`, in ascending order.
    pub fn get(&self, key: &K) -> &[V] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.get(key).binary_search(value).is_ok()
    }

    /// Remove every value stored under `key`.
    pub fn remove_key(&mut self, key: &K) -> Vec<V> {
        self.entries.remove(key).unwrap_or_default()
    }

    /// Remove one value; drops the key once it has no values left.
    pub fn remove_value(&mut self, key: &K, value: &V) -> bool {
        let Some(values) = self.entries.get_mut(key) else {
            return false;
        };
        let Ok(position) = values.binary_search(value) else {
            return false;
        };
        values.remove(position);
        if values.is_empty() {
            self.entries.remove(key);
        }
        true
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn value_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Append-only multi-map shared by the workers of a parallel phase.
///
/// Writers only append; duplicates are allowed and resolved when the map is
/// merged into a [`MultiMap`].
#[derive(Debug)]
pub struct ConcurrentMultiMap<K, V>
where
    K: Eq + Hash,
{
    shards: DashMap<K, Vec<V>>,
}

impl<K, V> Default for ConcurrentMultiMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            shards: DashMap::new(),
        }
    }
}

impl<K, V> ConcurrentMultiMap<K, V>
where
    K: Eq + Hash + Ord + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(capacity),
        }
    }

    pub fn append(&self, key: K, value: V) {
        self.shards.entry(key).or_default().push(value);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Consume the map into key-sorted groups.
    pub fn into_groups(self) -> Vec<(K, Vec<V>)> {
        let mut groups: Vec<(K, Vec<V>)> = self.shards.into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }
}

impl<K, V> ConcurrentMultiMap<K, V>
where
    K: Eq + Hash + Ord + Copy,
    V: Ord + Copy,
{
    /// Merge every appended value into canonical storage.
    pub fn merge_into(self, target: &mut MultiMap<K, V>) -> usize {
        let mut inserted = 0;
        target.reserve(self.shards.len());
        for (key, values) in self.into_groups() {
            for value in values {
                if target.insert(key, value) {
                    inserted += 1;
                }
            }
        }
        inserted
    }
}
