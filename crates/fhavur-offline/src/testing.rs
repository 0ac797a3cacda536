//! In-crate fakes for strategy and lifecycle tests

#![allow(clippy::unwrap_used)]

use crate::{
    classify::UrlClassifier,
    config::OfflineConfig,
    error::{CacheError, CacheResult, FetchError, FetchResult},
    namespace::NamespaceManager,
    network::Network,
    request::{FetchRequest, RequestKey, normalize_url},
    response::{FetchResponse, ResponseKind},
    storage::{CacheStorage, MemoryCacheStorage, ResponseCache},
    strategy::WorkerContext,
};
use async_trait::async_trait;
use http::{HeaderValue, StatusCode, header};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

pub const ORIGIN: &str = "http://localhost:8080";

/// Absolute URL on the test page origin
pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn key(path: &str) -> RequestKey {
    RequestKey::for_url(&url(path))
}

pub fn ok(body: &'static str) -> FetchResponse {
    FetchResponse::new(StatusCode::OK, body)
}

pub fn html(body: &'static str) -> FetchResponse {
    ok(body).with_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    )
}

/// Network answering from a per-URL script
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    responses: Mutex<HashMap<String, FetchResponse>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `url` with `response`; unscripted URLs get a 404
    pub fn respond(&self, url: &str, response: FetchResponse) {
        self.responses.lock().insert(normalize_url(url), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let url = normalize_url(url);
        self.calls.lock().iter().filter(|call| **call == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        let url = normalize_url(&request.url);
        self.calls.lock().push(url.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline { url });
        }

        let scripted = self.responses.lock().get(&url).cloned();
        let mut response = scripted.unwrap_or_else(|| FetchResponse::new(StatusCode::NOT_FOUND, ""));
        if response.url.is_empty() {
            response.url.clone_from(&url);
        }
        if response.kind == ResponseKind::Default {
            response.kind = ResponseKind::Basic;
        }
        Ok(response)
    }
}

/// Storage where every operation fails
#[derive(Debug, Default)]
pub struct FailingStorage;

impl FailingStorage {
    pub fn new() -> Self {
        Self
    }
}

fn closed() -> CacheError {
    CacheError::Backend("store closed".to_string())
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, _name: &str) -> CacheResult<Arc<dyn ResponseCache>> {
        Err(closed())
    }

    async fn has(&self, _name: &str) -> CacheResult<bool> {
        Err(closed())
    }

    async fn delete(&self, _name: &str) -> CacheResult<bool> {
        Err(closed())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Err(closed())
    }
}

/// Config for the test origin with a small static limit
pub fn test_config() -> OfflineConfig {
    OfflineConfig::new()
        .with_page_origin(ORIGIN)
        .with_static_cache_limit(5)
}

/// Context wired to a scripted network and in-memory storage
pub struct Harness {
    pub ctx: Arc<WorkerContext>,
    pub network: Arc<ScriptedNetwork>,
    pub storage: Arc<MemoryCacheStorage>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: OfflineConfig) -> Self {
        let network = ScriptedNetwork::new();
        let storage = Arc::new(MemoryCacheStorage::new());
        let ctx = context(config, storage.clone(), network.clone());
        Self {
            ctx,
            network,
            storage,
        }
    }
}

pub fn context(
    config: OfflineConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
) -> Arc<WorkerContext> {
    let classifier = UrlClassifier::new(&config).unwrap();
    let namespaces = NamespaceManager::new(storage, &config);
    Arc::new(WorkerContext::new(config, classifier, namespaces, network))
}
