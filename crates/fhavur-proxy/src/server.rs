//! Proxy state management and orchestration.
//!
//! Builds the offline controller from configuration, runs its install and
//! activate phases, and then serves intercepted requests until shutdown.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::logging::{LogControl, watch_log_level};
use fhavur_offline::{
    ActivateReport, BroadcastClients, CacheController, CacheStorage, DiskCacheStorage, HttpNetwork,
    InstallReport, MemoryCacheStorage,
};
use std::sync::Arc;
use url::Url;

/// Shared application state for the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Offline caching controller
    controller: Arc<CacheController>,

    /// Pages listening for controller broadcasts
    clients: Arc<BroadcastClients>,

    /// Origin the proxy fronts
    upstream: Url,
}

impl AppState {
    /// Create new application state from configuration.
    ///
    /// Uses disk storage when a cache directory is configured, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError` if the configuration is invalid or the cache
    /// directory cannot be created.
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let offline = config.offline_config()?;
        let upstream = config.upstream_url()?;

        let storage: Arc<dyn CacheStorage> = match &config.cache_dir {
            Some(dir) => {
                tracing::info!("Using disk cache storage at {}", dir.display());
                Arc::new(DiskCacheStorage::new(dir)?)
            }
            None => {
                tracing::info!("Using in-memory cache storage");
                Arc::new(MemoryCacheStorage::new())
            }
        };

        let network = HttpNetwork::new(&upstream, config.timeout())?;
        let clients = Arc::new(BroadcastClients::default());
        let controller =
            CacheController::new(offline, storage, Arc::new(network), clients.clone())
                .map_err(crate::error::ConfigError::from)?;

        Ok(Self::from_parts(controller, clients, upstream))
    }

    /// Assemble state around an already wired controller.
    ///
    /// `clients` must be the hub the controller broadcasts on.
    #[must_use]
    pub fn from_parts(
        controller: CacheController,
        clients: Arc<BroadcastClients>,
        upstream: Url,
    ) -> Self {
        Self {
            controller: Arc::new(controller),
            clients,
            upstream,
        }
    }

    /// Get reference to the offline controller.
    #[must_use]
    pub const fn controller(&self) -> &Arc<CacheController> {
        &self.controller
    }

    /// Get the client broadcast hub.
    #[must_use]
    pub const fn clients(&self) -> &Arc<BroadcastClients> {
        &self.clients
    }

    /// Get the upstream origin.
    #[must_use]
    pub const fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Run the install and activate phases.
    pub async fn warm_up(&self) -> (InstallReport, ActivateReport) {
        let installed = self.controller.install().await;
        let activated = self.controller.activate().await;
        (installed, activated)
    }
}

/// Proxy orchestration.
pub struct Server {
    /// Shared application state
    state: Arc<AppState>,
    /// Proxy configuration
    config: ProxyConfig,
    /// Runtime log filter, when the binary installed one
    log: Option<LogControl>,
}

impl Server {
    /// Create new proxy server with configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError` if the application state cannot be built.
    pub fn new(config: ProxyConfig, log: Option<LogControl>) -> Result<Self, ProxyError> {
        let state = AppState::new(&config)?;

        tracing::info!(
            "Proxy initialized for {} with cache version {}",
            state.upstream(),
            state.controller().version()
        );

        Ok(Self {
            state: Arc::new(state),
            config,
            log,
        })
    }

    /// Warm the cache, then serve until interrupted.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError` if binding fails or the server stops abnormally.
    pub async fn run(self) -> Result<(), ProxyError> {
        tracing::info!("Starting Fhavur caching proxy");

        if let Some(log) = self.log.clone() {
            tokio::spawn(watch_log_level(self.state.clients().subscribe(), log));
        }

        let (installed, activated) = self.state.warm_up().await;
        tracing::info!(
            "Pre-cached {} essential URLs ({} failed), removed {} stale namespaces",
            installed.cached.len(),
            installed.failed.len(),
            activated.deleted.len()
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("Shutdown signal received, stopping proxy");
        };

        crate::http::start_server(self.config.bind, self.state.clone(), shutdown).await?;
        tracing::info!(
            "Waiting for {} background tasks",
            self.state.controller().pending_background()
        );
        self.state.controller().settle_background().await;
        Ok(())
    }
}
