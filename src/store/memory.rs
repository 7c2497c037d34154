use crate::core::cache::{CacheEntry, CacheStore, Namespace};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type Partition = RwLock<HashMap<String, CacheEntry>>;

/// In-memory store with one independent map per namespace.
///
/// Locks are only held for the map access itself. Entries are never evicted;
/// expired ones stay until overwritten by the next successful fetch.
pub struct MemoryStore {
    partitions: HashMap<Namespace, Partition>,
}

impl MemoryStore {
    /// Creates an empty store with every namespace allocated up front
    pub fn new() -> Self {
        Self {
            partitions: Namespace::ALL
                .into_iter()
                .map(|namespace| (namespace, RwLock::new(HashMap::new())))
                .collect(),
        }
    }

    fn partition(&self, namespace: Namespace) -> &Partition {
        // Every namespace is inserted by `new`
        &self.partitions[&namespace]
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, namespace: Namespace, key: &str) -> Option<CacheEntry> {
        let partition = self
            .partition(namespace)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = partition.get(key).cloned();
        if entry.is_some() {
            debug!(%namespace, key, "Cache HIT");
        } else {
            debug!(%namespace, key, "Cache MISS");
        }
        entry
    }

    fn put(&self, namespace: Namespace, key: &str, payload: Arc<Value>) {
        let entry = CacheEntry::new(payload);
        let mut partition = self
            .partition(namespace)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(%namespace, key, "Cache PUT");
        partition.insert(key.to_string(), entry);
    }

    fn clear(&self, namespace: Namespace) {
        let mut partition = self
            .partition(namespace)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        partition.clear();
        debug!(%namespace, "Cache CLEAR");
    }

    fn len(&self, namespace: Namespace) -> usize {
        self.partition(namespace)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn last_fetched(&self, namespace: Namespace) -> Option<DateTime<Utc>> {
        self.partition(namespace)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entry| entry.fetched_on)
            .max()
    }
}
