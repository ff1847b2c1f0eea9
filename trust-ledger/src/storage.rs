//! Storage seam
//!
//! The engine never owns a database. Components take an injected
//! [`Store`] per record type; [`MemoryStore`] is the in-process backend and
//! the fake used by tests. Writers on the same subject are serialized with
//! [`SubjectLocks`] so every operation is one read-modify-write cycle.

use crate::{error::Result, types::SubjectId};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

/// Key/value store for one record type
pub trait Store<V>: Send + Sync {
    /// Fetch a record by key
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Insert or replace the record stored under `key`
    fn put(&self, key: &str, value: V) -> Result<()>;

    /// Return every record matching `predicate`
    fn scan(&self, predicate: &dyn Fn(&V) -> bool) -> Result<Vec<V>>;
}

/// Shared store handle
pub type SharedStore<V> = Arc<dyn Store<V>>;

/// In-memory store backed by a concurrent map
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Store<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: V) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn scan(&self, predicate: &dyn Fn(&V) -> bool) -> Result<Vec<V>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// Convenience constructor for a shared in-memory store
pub fn memory_store<V: Clone + Send + Sync + 'static>() -> SharedStore<V> {
    Arc::new(MemoryStore::new())
}

/// Per-key writer locks
///
/// Different keys never contend; two writers on one key run one after the
/// other.
pub struct KeyLocks<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Writer locks keyed by subject
pub type SubjectLocks = KeyLocks<SubjectId>;

impl<K: Eq + Hash + Clone> Default for KeyLocks<K> {
    fn default() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyLocks<K> {
    /// Create empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the key's lock
    pub fn with<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        // Clone the Arc out so the map shard is released before blocking.
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();
        f()
    }

    /// Number of keys seen
    pub fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}
