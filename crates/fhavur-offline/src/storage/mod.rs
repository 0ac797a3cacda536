//! Cache storage abstraction
//!
//! Mirrors the browser Cache Storage model: a [`CacheStorage`] holds named
//! partitions, each a [`ResponseCache`] mapping request keys to response
//! snapshots. Strategies only ever see these traits, so the whole routing
//! layer runs unchanged against the in-memory and on-disk backends.
//!
//! Key enumeration order is insertion order. Overwriting an entry counts as a
//! fresh insertion, so trimming by enumeration order removes the entries that
//! were written longest ago.

use crate::{error::CacheResult, request::RequestKey, response::FetchResponse};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

pub mod disk;
pub mod memory;

pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;

/// One named partition of the response store
#[async_trait]
pub trait ResponseCache: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &RequestKey) -> CacheResult<Option<FetchResponse>>;

    /// Replaces any existing entry for `key`.
    async fn put(&self, key: RequestKey, response: FetchResponse) -> CacheResult<()>;

    /// Returns true if the key was present and removed.
    async fn delete(&self, key: &RequestKey) -> CacheResult<bool>;

    /// Oldest first.
    async fn keys(&self) -> CacheResult<Vec<RequestKey>>;

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.keys().await?.len())
    }

    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Registry of named partitions
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the partition if it does not exist yet.
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn ResponseCache>>;

    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Returns true if the partition existed.
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Every partition name currently stored.
    async fn keys(&self) -> CacheResult<Vec<String>>;
}

/// Partition names end up as directory names on disk
pub(crate) fn validate_name(name: &str) -> CacheResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(crate::error::CacheError::InvalidNamespace(name.to_string()))
    }
}

/// Insertion-ordered key/value table shared by the storage backends
#[derive(Debug)]
pub(crate) struct EntryTable<V> {
    order: BTreeMap<u64, RequestKey>,
    entries: HashMap<RequestKey, (u64, V)>,
    next_seq: u64,
}

impl<V> Default for EntryTable<V> {
    fn default() -> Self {
        Self {
            order: BTreeMap::new(),
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<V> EntryTable<V> {
    /// Insert at the newest position; returns the sequence number used and
    /// the entry it replaced.
    pub(crate) fn insert(&mut self, key: RequestKey, value: V) -> (u64, Option<(u64, V)>) {
        let previous = self.remove(&key);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, value));
        (seq, previous)
    }

    /// Restore an entry with a known sequence number (index reload).
    pub(crate) fn restore(&mut self, seq: u64, key: RequestKey, value: V) {
        self.next_seq = self.next_seq.max(seq.saturating_add(1));
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, value));
    }

    pub(crate) fn remove(&mut self, key: &RequestKey) -> Option<(u64, V)> {
        let (seq, value) = self.entries.remove(key)?;
        self.order.remove(&seq);
        Some((seq, value))
    }

    pub(crate) fn get(&self, key: &RequestKey) -> Option<&V> {
        self.entries.get(key).map(|(_, value)| value)
    }

    pub(crate) fn get_with_seq(&self, key: &RequestKey) -> Option<(u64, &V)> {
        self.entries.get(key).map(|(seq, value)| (*seq, value))
    }

    pub(crate) fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn keys(&self) -> Vec<RequestKey> {
        self.order.values().cloned().collect()
    }

    /// Entries oldest first with their sequence numbers
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &RequestKey, &V)> {
        self.order.iter().filter_map(|(seq, key)| {
            self.entries.get(key).map(|(_, value)| (*seq, key, value))
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
