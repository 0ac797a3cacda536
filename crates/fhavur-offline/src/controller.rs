//! Worker lifecycle and request entry points
//!
//! [`CacheController`] is the single object a host talks to. It is built from
//! injected configuration, storage, network and client hub; there is no global
//! state. The lifecycle runs `install` then `activate`, after which every
//! intercepted request goes through [`CacheController::handle_fetch`].

#![allow(missing_docs)]

use crate::{
    classify::{Classification, UrlClassifier},
    clients::ClientHub,
    config::OfflineConfig,
    error::{ConfigError, FetchResult},
    message::{ClientMessage, ControlMessage, LogLevel},
    namespace::{CacheRole, NamespaceManager},
    network::Network,
    request::{FetchRequest, RequestKey},
    response::FetchResponse,
    router::{Route, route},
    stats::MetricsSnapshot,
    storage::CacheStorage,
    strategy::{WorkerContext, execute},
};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, info, warn};
use url::Url;

/// Sync tag that would replay deferred requests
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Lifecycle phase of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Outcome of [`CacheController::install`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Essential URLs now in the static namespace
    pub cached: Vec<String>,
    /// Essential URLs that could not be pre-cached, with the reason
    pub failed: Vec<(String, String)>,
}

/// Outcome of [`CacheController::activate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Stale namespaces removed
    pub deleted: Vec<String>,
    pub clients_claimed: usize,
}

/// Reply to a [`ControlMessage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageOutcome {
    SkipWaiting { state: WorkerState },
    LogLevel { level: LogLevel, notified: usize },
    Version { version: String },
}

/// Reply to a background sync event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed { tag: String },
    Ignored { tag: String },
}

/// Offline caching worker
pub struct CacheController {
    ctx: Arc<WorkerContext>,
    clients: Arc<dyn ClientHub>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    log_level: RwLock<LogLevel>,
}

impl fmt::Debug for CacheController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheController")
            .field("version", &self.ctx.config.cache_version)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl CacheController {
    /// Validate `config` and wire the worker together
    pub fn new(
        config: OfflineConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientHub>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = UrlClassifier::new(&config)?;
        let namespaces = NamespaceManager::new(storage, &config);

        Ok(Self {
            ctx: Arc::new(WorkerContext::new(config, classifier, namespaces, network)),
            clients,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            log_level: RwLock::new(LogLevel::default()),
        })
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
        debug!(?state, "Worker state changed");
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.ctx.config
    }

    pub fn version(&self) -> &str {
        &self.ctx.config.cache_version
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.ctx.namespaces
    }

    /// Whether activation was asked to skip waiting for old pages
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Acquire)
    }

    pub fn log_level(&self) -> LogLevel {
        *self.log_level.read()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn classify(&self, url: &str) -> Classification {
        self.ctx.classifier.classify(url)
    }

    pub fn route(&self, request: &FetchRequest) -> Route {
        route(&self.ctx.classifier, request)
    }

    /// Background trims and revalidations not yet reaped
    pub fn pending_background(&self) -> usize {
        self.ctx.background.pending()
    }

    /// Wait for background trims and revalidations to finish
    pub async fn settle_background(&self) {
        self.ctx.background.settle().await;
    }

    /// Pre-cache the essential URLs, open the dynamic namespace and request
    /// skip-waiting. Individual failures are reported, never fatal.
    pub async fn install(&self) -> InstallReport {
        self.set_state(WorkerState::Installing);
        info!(version = %self.version(), "Installing");

        let origin = self.ctx.config.origin_url().ok();
        let fetches = self.ctx.config.essential_urls.iter().map(|essential| {
            let resolved = resolve(origin.as_ref(), essential);
            async move {
                let url = resolved.map_err(|reason| (essential.clone(), reason))?;
                self.precache(&url).await.map_err(|reason| (url.clone(), reason))?;
                Ok::<_, (String, String)>(url)
            }
        });

        let mut report = InstallReport::default();
        for result in join_all(fetches).await {
            match result {
                Ok(url) => report.cached.push(url),
                Err((url, reason)) => {
                    warn!(url = %url, reason = %reason, "Failed to pre-cache essential URL");
                    report.failed.push((url, reason));
                }
            }
        }

        if let Err(e) = self.ctx.namespaces.open(CacheRole::Dynamic).await {
            warn!(error = %e, "Failed to open dynamic namespace");
        }

        self.skip_waiting.store(true, Ordering::Release);
        self.set_state(WorkerState::Installed);
        info!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );
        report
    }

    async fn precache(&self, url: &str) -> Result<(), String> {
        let response = self
            .ctx
            .fetch(&FetchRequest::get(url))
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_storable() {
            return Err(format!("unexpected status {}", response.status));
        }

        let stored = self
            .ctx
            .namespaces
            .store(CacheRole::Static, RequestKey::for_url(url), response)
            .await;
        if stored {
            Ok(())
        } else {
            Err("cache write failed".to_string())
        }
    }

    /// Remove stale namespaces, claim open pages and announce the version
    pub async fn activate(&self) -> ActivateReport {
        self.set_state(WorkerState::Activating);

        let current = self.ctx.namespaces.current_names();
        let deleted = self.ctx.namespaces.cleanup_stale(&current).await;
        let clients_claimed = self.clients.claim();
        self.clients.broadcast(ClientMessage::Activated {
            version: self.version().to_string(),
        });

        self.set_state(WorkerState::Activated);
        info!(
            version = %self.version(),
            deleted = deleted.len(),
            clients_claimed,
            "Activated"
        );

        ActivateReport {
            deleted,
            clients_claimed,
        }
    }

    /// Answer one intercepted request. Only passthrough requests can fail.
    pub async fn handle_fetch(&self, request: FetchRequest) -> FetchResult<FetchResponse> {
        self.ctx.metrics.record_request();
        let routed = self.route(&request);
        execute(&self.ctx, &request, routed).await
    }

    pub fn handle_message(&self, message: ControlMessage) -> MessageOutcome {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting.store(true, Ordering::Release);
                info!("Skip waiting requested");
                MessageOutcome::SkipWaiting {
                    state: self.state(),
                }
            }
            ControlMessage::SetLogLevel { level } => {
                *self.log_level.write() = level;
                let notified = self.clients.broadcast(ClientMessage::LogLevelChanged { level });
                info!(%level, notified, "Log level changed");
                MessageOutcome::LogLevel { level, notified }
            }
            ControlMessage::GetVersion => MessageOutcome::Version {
                version: self.version().to_string(),
            },
        }
    }

    pub async fn handle_sync(&self, tag: &str) -> SyncOutcome {
        if tag == BACKGROUND_SYNC_TAG {
            // Deferred request replay has nothing queued yet
            debug!(tag, "Background sync completed");
            SyncOutcome::Completed {
                tag: tag.to_string(),
            }
        } else {
            debug!(tag, "Ignoring unknown sync tag");
            SyncOutcome::Ignored {
                tag: tag.to_string(),
            }
        }
    }
}

/// Absolute essential URL; relative entries resolve against the page origin
fn resolve(origin: Option<&Url>, essential: &str) -> Result<String, String> {
    if let Ok(absolute) = Url::parse(essential) {
        return Ok(absolute.into());
    }
    let origin = origin.ok_or_else(|| "page origin is not a valid URL".to_string())?;
    origin
        .join(essential)
        .map(Into::into)
        .map_err(|e| format!("invalid URL: {e}"))
}
