//! Versioned cache namespaces
//!
//! The worker owns exactly two current partitions, `{prefix}-static-{version}`
//! and `{prefix}-dynamic-{version}`. Everything else found in storage is
//! stale and removed by [`NamespaceManager::cleanup_stale`] during activation.
//!
//! Storage failures never escape this module: each one is logged and turned
//! into a no-op (a miss, a `false` store, an empty cleanup), so lifecycle
//! steps and strategies keep going when the backing store misbehaves.

use crate::{
    config::OfflineConfig,
    error::CacheResult,
    request::RequestKey,
    response::FetchResponse,
    storage::{CacheStorage, ResponseCache},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, sync::Arc};
use tracing::{debug, info, warn};

/// Role of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheRole {
    /// Pre-cached shell and cache-first assets, size bounded
    Static,
    /// Documents and external libraries populated at runtime
    Dynamic,
}

impl CacheRole {
    pub const ALL: [Self; 2] = [Self::Static, Self::Dynamic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for CacheRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of namespace naming, creation and garbage collection
pub struct NamespaceManager {
    storage: Arc<dyn CacheStorage>,
    prefix: String,
    version: String,
}

impl fmt::Debug for NamespaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceManager")
            .field("prefix", &self.prefix)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl NamespaceManager {
    pub fn new(storage: Arc<dyn CacheStorage>, config: &OfflineConfig) -> Self {
        Self {
            storage,
            prefix: config.cache_prefix.clone(),
            version: config.cache_version.clone(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current namespace name for `role`
    pub fn name(&self, role: CacheRole) -> String {
        format!("{}-{}-{}", self.prefix, role, self.version)
    }

    /// Names of both current namespaces
    pub fn current_names(&self) -> HashSet<String> {
        CacheRole::ALL.iter().map(|role| self.name(*role)).collect()
    }

    /// Handle for the current namespace of `role`, created if absent
    pub async fn open(&self, role: CacheRole) -> CacheResult<Arc<dyn ResponseCache>> {
        self.storage.open(&self.name(role)).await
    }

    async fn open_logged(&self, role: CacheRole) -> Option<Arc<dyn ResponseCache>> {
        match self.open(role).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(namespace = %self.name(role), error = %e, "Failed to open namespace");
                None
            }
        }
    }

    /// Delete every stored namespace not named in `current`
    pub async fn cleanup_stale(&self, current: &HashSet<String>) -> Vec<String> {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate namespaces");
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| !current.contains(name)) {
            match self.storage.delete(&name).await {
                Ok(true) => {
                    info!(namespace = %name, "Deleted stale namespace");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => warn!(namespace = %name, error = %e, "Failed to delete stale namespace"),
            }
        }
        deleted
    }

    /// Delete the oldest entries of `role` until at most `limit` remain
    pub async fn trim(&self, role: CacheRole, limit: usize) -> usize {
        let Some(cache) = self.open_logged(role).await else {
            return 0;
        };

        let keys = match cache.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(namespace = %cache.name(), error = %e, "Failed to list entries for trim");
                return 0;
            }
        };

        if keys.len() <= limit {
            return 0;
        }

        let excess = keys.len() - limit;
        let mut removed = 0;
        for key in keys.iter().take(excess) {
            match cache.delete(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(namespace = %cache.name(), key = %key, error = %e, "Failed to trim entry"),
            }
        }

        debug!(namespace = %cache.name(), removed, limit, "Trimmed namespace");
        removed
    }

    /// Cached response for `key` in `role`; failures read as a miss
    pub async fn lookup(&self, role: CacheRole, key: &RequestKey) -> Option<FetchResponse> {
        let cache = self.open_logged(role).await?;
        match cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(namespace = %cache.name(), key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Dynamic first, then static
    pub async fn lookup_any(&self, key: &RequestKey) -> Option<FetchResponse> {
        if let Some(hit) = self.lookup(CacheRole::Dynamic, key).await {
            return Some(hit);
        }
        self.lookup(CacheRole::Static, key).await
    }

    /// Write `response` under `key`; returns whether it was stored
    pub async fn store(&self, role: CacheRole, key: RequestKey, response: FetchResponse) -> bool {
        let Some(cache) = self.open_logged(role).await else {
            return false;
        };

        let shown = key.to_string();
        match cache.put(key, response).await {
            Ok(()) => {
                debug!(namespace = %cache.name(), key = %shown, "Stored response");
                true
            }
            Err(e) => {
                warn!(namespace = %cache.name(), key = %shown, error = %e, "Cache write failed");
                false
            }
        }
    }
}
