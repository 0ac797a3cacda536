//! Fetch strategies
//!
//! Each strategy turns one intercepted request into exactly one response.
//! Network failures are always recovered inside the strategy, either from
//! cache or with a synthesized fallback; only [`Dispatch::Passthrough`]
//! surfaces a [`FetchError`](crate::error::FetchError).

use crate::{
    background::BackgroundTasks,
    classify::{Classification, UrlClassifier},
    config::OfflineConfig,
    error::{FetchError, FetchResult},
    fallback::fallback_kind,
    namespace::{CacheRole, NamespaceManager},
    network::Network,
    request::{FetchRequest, RequestKey},
    response::FetchResponse,
    router::{Dispatch, Route},
    stats::FetchMetrics,
};
use std::{convert::Infallible, fmt, sync::Arc};
use tracing::{debug, trace};

pub mod document;
pub mod revalidate;
pub mod static_asset;
pub mod stylesheet;

/// Everything a strategy needs, shared with the tasks it spawns
pub struct WorkerContext {
    pub config: OfflineConfig,
    pub classifier: UrlClassifier,
    pub namespaces: NamespaceManager,
    pub network: Arc<dyn Network>,
    pub background: BackgroundTasks,
    pub metrics: FetchMetrics,
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("namespaces", &self.namespaces)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl WorkerContext {
    pub fn new(
        config: OfflineConfig,
        classifier: UrlClassifier,
        namespaces: NamespaceManager,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            classifier,
            namespaces,
            network,
            background: BackgroundTasks::new(),
            metrics: FetchMetrics::new(),
        }
    }

    /// Network fetch with metrics
    pub(crate) async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        self.metrics.record_network_fetch();
        self.network.fetch(request).await.inspect_err(|e| {
            self.metrics.record_network_failure();
            debug!(url = %request.url, error = %e, "Network unavailable");
        })
    }

    /// Count a synthesized response before handing it out
    pub(crate) fn serve_fallback(&self, response: FetchResponse) -> FetchResponse {
        if let Some(kind) = fallback_kind(&response) {
            self.metrics.record_fallback(kind);
        }
        response
    }
}

/// External resources live in the dynamic namespace, everything else in static
pub(crate) fn role_for(classification: Classification) -> CacheRole {
    if classification.is_external {
        CacheRole::Dynamic
    } else {
        CacheRole::Static
    }
}

/// Trim the static namespace to its limit on a background task
pub(crate) fn schedule_trim(ctx: &Arc<WorkerContext>) {
    let task_ctx = Arc::clone(ctx);
    ctx.background.spawn("trim-static", async move {
        let limit = task_ctx.config.static_cache_limit;
        let removed = task_ctx.namespaces.trim(CacheRole::Static, limit).await;
        task_ctx.metrics.record_trim(removed);
        Ok::<_, Infallible>(())
    });
}

/// Cache-first lookup shared by the static and stylesheet strategies
pub(crate) async fn cache_first<F>(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    classification: Classification,
    on_failure: F,
) -> FetchResponse
where
    F: FnOnce(&FetchError) -> FetchResponse,
{
    let key = RequestKey::for_url(&request.url);
    let role = role_for(classification);

    if let Some(hit) = ctx.namespaces.lookup(role, &key).await {
        ctx.metrics.record_hit();
        trace!(url = %request.url, namespace = %role, "Cache hit");
        return hit;
    }
    ctx.metrics.record_miss();

    match ctx.fetch(request).await {
        Ok(response) => {
            if response.is_storable()
                && ctx.namespaces.store(role, key, response.clone()).await
                && role == CacheRole::Static
            {
                schedule_trim(ctx);
            }
            response
        }
        Err(error) => ctx.serve_fallback(on_failure(&error)),
    }
}

/// Run the strategy chosen by the router
pub async fn execute(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    route: Route,
) -> FetchResult<FetchResponse> {
    match route.dispatch {
        Dispatch::Passthrough => {
            ctx.metrics.record_passthrough();
            ctx.fetch(request).await
        }
        Dispatch::StaticAsset => Ok(static_asset::handle(ctx, request, route.classification).await),
        Dispatch::Stylesheet => Ok(stylesheet::handle(ctx, request, route.classification).await),
        Dispatch::Document => Ok(document::handle(ctx, request).await),
        Dispatch::StaleWhileRevalidate => {
            Ok(revalidate::handle(ctx, request, route.classification).await)
        }
    }
}
