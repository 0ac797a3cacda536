//! Disk-backed cache storage
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<namespace>/index.json   entry metadata, oldest first
//! <root>/<namespace>/<seq>.body   response body for entry <seq>
//! ```
//!
//! Bodies and the index are written to a temporary file and renamed into
//! place, so a crash leaves either the old or the new version on disk. The
//! index is kept in memory and rewritten after every mutation.

use super::{CacheStorage, EntryTable, ResponseCache, validate_name};
use crate::{
    error::{CacheError, CacheResult},
    request::RequestKey,
    response::{FetchResponse, ResponseKind},
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";

/// Everything about a stored response except its body
///
/// Header values are kept as raw bytes; HTTP allows values that are not UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    status: u16,
    headers: Vec<(String, Vec<u8>)>,
    url: String,
    redirected: bool,
    kind: ResponseKind,
    size: usize,
}

impl EntryMeta {
    fn from_response(response: &FetchResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            url: response.url.clone(),
            redirected: response.redirected,
            kind: response.kind,
            size: response.body.len(),
        }
    }

    fn into_response(self, body: Bytes) -> CacheResult<FetchResponse> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|_| CacheError::Corruption(format!("invalid status {}", self.status)))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| CacheError::Corruption(format!("invalid header name {name}")))?;
            let value = HeaderValue::from_bytes(&value)
                .map_err(|_| CacheError::Corruption(format!("invalid value for header {name}")))?;
            headers.append(name, value);
        }

        Ok(FetchResponse {
            status,
            headers,
            body,
            url: self.url,
            redirected: self.redirected,
            kind: self.kind,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    seq: u64,
    key: RequestKey,
    meta: EntryMeta,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    entries: Vec<IndexRecord>,
}

/// Write `data` next to `path` and rename it into place
async fn write_atomic(path: &Path, data: &[u8]) -> CacheResult<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, data).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> CacheResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Rebuild the entry table from a serialized index
fn restore_index(raw: &[u8]) -> CacheResult<EntryTable<EntryMeta>> {
    let index: IndexFile = serde_json::from_slice(raw)?;

    let mut table = EntryTable::default();
    let mut seen = HashSet::with_capacity(index.entries.len());
    for record in index.entries {
        // u64::MAX leaves no room for the next write
        if record.seq == u64::MAX || !seen.insert(record.seq) || table.contains(&record.key) {
            return Err(CacheError::Corruption(format!(
                "duplicate or out of range entry {} for {}",
                record.seq, record.key
            )));
        }
        table.restore(record.seq, record.key, record.meta);
    }
    Ok(table)
}

/// Remove the index and every body file in a namespace directory
async fn discard_entries(dir: &Path) -> CacheResult<()> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_entry_file = path
            .extension()
            .is_some_and(|ext| ext == "body" || ext == "json" || ext == "tmp");
        if is_entry_file {
            remove_if_present(&path).await?;
        }
    }
    Ok(())
}

/// One namespace directory
#[derive(Debug)]
pub struct DiskResponseCache {
    name: String,
    dir: PathBuf,
    index: Mutex<EntryTable<EntryMeta>>,
    closed: AtomicBool,
}

impl DiskResponseCache {
    async fn load(name: &str, dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&dir).await?;

        let table = match fs::read(dir.join(INDEX_FILE)).await {
            Ok(raw) => match restore_index(&raw) {
                Ok(table) => table,
                Err(e) => {
                    warn!("Discarding unreadable index for namespace {}: {}", name, e);
                    discard_entries(&dir).await?;
                    EntryTable::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => EntryTable::default(),
            Err(e) => return Err(e.into()),
        };

        debug!("Loaded namespace {} with {} entries", name, table.len());

        Ok(Self {
            name: name.to_string(),
            dir,
            index: Mutex::new(table),
            closed: AtomicBool::new(false),
        })
    }

    fn body_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{seq}.body"))
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::NamespaceClosed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    async fn persist(&self, table: &EntryTable<EntryMeta>) -> CacheResult<()> {
        let index = IndexFile {
            entries: table
                .iter()
                .map(|(seq, key, meta)| IndexRecord {
                    seq,
                    key: key.clone(),
                    meta: meta.clone(),
                })
                .collect(),
        };
        let data = serde_json::to_vec(&index)?;
        write_atomic(&self.dir.join(INDEX_FILE), &data).await
    }
}

#[async_trait]
impl ResponseCache for DiskResponseCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &RequestKey) -> CacheResult<Option<FetchResponse>> {
        self.ensure_open()?;
        let (seq, meta) = {
            let index = self.index.lock().await;
            match index.get_with_seq(key) {
                Some((seq, meta)) => (seq, meta.clone()),
                None => return Ok(None),
            }
        };

        let body = match fs::read(self.body_path(seq)).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::Corruption(format!(
                    "body file missing for {key} in {}",
                    self.name
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if body.len() != meta.size {
            return Err(CacheError::Corruption(format!(
                "body size mismatch for {key}: expected {}, found {}",
                meta.size,
                body.len()
            )));
        }

        meta.into_response(body).map(Some)
    }

    async fn put(&self, key: RequestKey, response: FetchResponse) -> CacheResult<()> {
        self.ensure_open()?;
        let mut index = self.index.lock().await;

        let meta = EntryMeta::from_response(&response);
        let (seq, previous) = index.insert(key.clone(), meta);

        let written = match write_atomic(&self.body_path(seq), &response.body).await {
            Ok(()) => self.persist(&index).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            index.remove(&key);
            if let Some((old_seq, old_meta)) = previous {
                index.restore(old_seq, key, old_meta);
            }
            let _ = remove_if_present(&self.body_path(seq)).await;
            return Err(e);
        }

        if let Some((old_seq, _)) = previous
            && let Err(e) = remove_if_present(&self.body_path(old_seq)).await
        {
            warn!("Failed to remove replaced body {} in {}: {}", old_seq, self.name, e);
        }

        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> CacheResult<bool> {
        self.ensure_open()?;
        let mut index = self.index.lock().await;

        let Some((seq, meta)) = index.remove(key) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&index).await {
            index.restore(seq, key.clone(), meta);
            return Err(e);
        }

        remove_if_present(&self.body_path(seq)).await?;
        Ok(true)
    }

    async fn keys(&self) -> CacheResult<Vec<RequestKey>> {
        self.ensure_open()?;
        Ok(self.index.lock().await.keys())
    }

    async fn len(&self) -> CacheResult<usize> {
        self.ensure_open()?;
        Ok(self.index.lock().await.len())
    }
}

/// Cache storage persisted under a root directory
#[derive(Debug)]
pub struct DiskCacheStorage {
    root: PathBuf,
    open: DashMap<String, Arc<DiskResponseCache>>,
}

impl DiskCacheStorage {
    /// Create storage rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            open: DashMap::new(),
        })
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn ResponseCache>> {
        validate_name(name)?;

        if let Some(cache) = self.open.get(name) {
            let cache: Arc<dyn ResponseCache> = cache.value().clone();
            return Ok(cache);
        }

        let loaded = Arc::new(DiskResponseCache::load(name, self.root.join(name)).await?);
        let cache: Arc<dyn ResponseCache> = self
            .open
            .entry(name.to_string())
            .or_insert(loaded)
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        if validate_name(name).is_err() {
            return Ok(false);
        }
        if self.open.contains_key(name) {
            return Ok(true);
        }
        Ok(fs::try_exists(self.root.join(name)).await?)
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        validate_name(name)?;

        let was_open = match self.open.remove(name) {
            Some((_, cache)) => {
                cache.closed.store(true, Ordering::Release);
                true
            }
            None => false,
        };

        match fs::remove_dir_all(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(was_open),
            Err(e) => Err(e.into()),
        }
    }

    /// Directory names, sorted
    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str()
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
