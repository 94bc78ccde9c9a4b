//! In-memory state-data context.
//!
//! This adapter stores state snapshots in a sharded concurrent map, so the
//! expander can register successors from many worker threads at once.

use std::{
    collections::hash_map::DefaultHasher,
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ports::StateDataContext;

/// Key of a state stored in a [`StateArena`].
///
/// Keys are never reused, so a destroyed key stays invalid for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArenaKey(u64);

impl ArenaKey {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArenaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// In-memory store for any `Clone + Eq + Hash` state data.
///
/// # Examples
///
/// ```
/// use boundplan::{adapters::StateArena, ports::StateDataContext};
///
/// let arena = StateArena::new();
/// let a = arena.insert(vec![1, 2]);
/// let b = arena.insert(vec![1, 2]);
/// assert_ne!(a, b);
/// assert_eq!(arena.state_data(a), arena.state_data(b));
///
/// arena.destroy_state(a);
/// assert!(arena.state_data(a).is_none());
/// ```
///
/// # Thread Safety
///
/// All methods take `&self`; share the arena with `Arc`.
pub struct StateArena<D> {
    states: DashMap<ArenaKey, D>,
    next_key: AtomicU64,
    destroyed: AtomicUsize,
    invalid_destroys: AtomicUsize,
}

impl<D> StateArena<D> {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
            next_key: AtomicU64::new(0),
            destroyed: AtomicUsize::new(0),
            invalid_destroys: AtomicUsize::new(0),
        }
    }

    /// Number of live states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, key: ArenaKey) -> bool {
        self.states.contains_key(&key)
    }

    /// Number of successful destroys.
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Destroys of keys that were unknown or already destroyed.
    pub fn invalid_destroy_count(&self) -> usize {
        self.invalid_destroys.load(Ordering::Relaxed)
    }

    /// Store `data` under a fresh key.
    pub fn insert(&self, data: D) -> ArenaKey {
        let key = ArenaKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        self.states.insert(key, data);
        key
    }
}

impl<D> Default for StateArena<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> StateDataContext for StateArena<D>
where
    D: Clone + Eq + Hash + Send + Sync,
{
    type StateKey = ArenaKey;
    type StateData = D;

    fn state_data(&self, key: ArenaKey) -> Option<D> {
        self.states.get(&key).map(|entry| entry.value().clone())
    }

    fn register_state(&self, data: D) -> ArenaKey {
        self.insert(data)
    }

    fn destroy_state(&self, key: ArenaKey) {
        if self.states.remove(&key).is_some() {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.invalid_destroys.fetch_add(1, Ordering::Relaxed);
            warn!(%key, "destroy of an unknown state ignored");
        }
    }

    fn state_data_equals(&self, a: &D, b: &D) -> bool {
        a == b
    }

    fn state_data_hash(&self, data: &D) -> u64 {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        hasher.finish()
    }
}
