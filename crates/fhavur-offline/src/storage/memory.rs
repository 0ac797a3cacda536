//! In-memory cache storage
//!
//! Partitions live in a [`DashMap`] keyed by name; each partition guards its
//! insertion-ordered entry table with a `parking_lot` read/write lock. An
//! optional per-partition entry quota makes storage pressure reproducible in
//! tests and small deployments.

use super::{CacheStorage, EntryTable, ResponseCache, validate_name};
use crate::{
    error::{CacheError, CacheResult},
    request::RequestKey,
    response::FetchResponse,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tracing::debug;

/// One in-memory partition
#[derive(Debug)]
pub struct MemoryResponseCache {
    name: String,
    entries: RwLock<EntryTable<FetchResponse>>,
    max_entries: Option<usize>,
    closed: AtomicBool,
    created: u64,
}

impl MemoryResponseCache {
    fn new(name: &str, max_entries: Option<usize>, created: u64) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(EntryTable::default()),
            max_entries,
            closed: AtomicBool::new(false),
            created,
        }
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::NamespaceClosed(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> CacheResult<Option<FetchResponse>> {
        self.ensure_open()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: RequestKey, response: FetchResponse) -> CacheResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write();

        if let Some(limit) = self.max_entries
            && !entries.contains(&key)
            && entries.len() >= limit
        {
            return Err(CacheError::QuotaExceeded);
        }

        entries.insert(key, response);
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> CacheResult<bool> {
        self.ensure_open()?;
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<RequestKey>> {
        self.ensure_open()?;
        Ok(self.entries.read().keys())
    }

    async fn len(&self) -> CacheResult<usize> {
        self.ensure_open()?;
        Ok(self.entries.read().len())
    }
}

/// Cache storage held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: DashMap<String, Arc<MemoryResponseCache>>,
    max_entries: Option<usize>,
    created: AtomicU64,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject new keys once a partition holds `limit` entries
    pub fn with_entry_quota(mut self, limit: usize) -> Self {
        self.max_entries = Some(limit);
        self
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn ResponseCache>> {
        validate_name(name)?;
        let cache: Arc<dyn ResponseCache> = self
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating in-memory namespace {}", name);
                let created = self.created.fetch_add(1, Ordering::Relaxed);
                Arc::new(MemoryResponseCache::new(name, self.max_entries, created))
            })
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.caches.contains_key(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        match self.caches.remove(name) {
            Some((_, cache)) => {
                cache.closed.store(true, Ordering::Release);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Names in creation order
    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<(u64, String)> = self
            .caches
            .iter()
            .map(|entry| (entry.value().created, entry.key().clone()))
            .collect();
        names.sort();
        Ok(names.into_iter().map(|(_, name)| name).collect())
    }
}
