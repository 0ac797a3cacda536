//! Stale-while-revalidate strategy for data files
//!
//! A hit is answered immediately from cache while a background task fetches
//! a fresh copy for next time. The caller never waits for that fetch.

use super::{WorkerContext, role_for};
use crate::{
    classify::Classification,
    error::FetchError,
    fallback::offline_page,
    namespace::CacheRole,
    request::{FetchRequest, RequestKey},
    response::FetchResponse,
};
use std::sync::Arc;
use tracing::{debug, trace};

pub async fn handle(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    classification: Classification,
) -> FetchResponse {
    let key = RequestKey::for_url(&request.url);
    let role = role_for(classification);

    if let Some(hit) = ctx.namespaces.lookup(role, &key).await {
        ctx.metrics.record_hit();
        trace!(url = %request.url, "Serving cached copy, revalidating in background");
        spawn_revalidation(ctx, request.clone(), key, role);
        return hit;
    }
    ctx.metrics.record_miss();

    match ctx.fetch(request).await {
        Ok(response) => {
            if response.is_storable() {
                ctx.namespaces.store(role, key, response.clone()).await;
            }
            response
        }
        Err(_) => ctx.serve_fallback(offline_page(&ctx.config.site_title, &request.url)),
    }
}

fn spawn_revalidation(
    ctx: &Arc<WorkerContext>,
    request: FetchRequest,
    key: RequestKey,
    role: CacheRole,
) {
    let task_ctx = Arc::clone(ctx);
    ctx.background.spawn("revalidate", async move {
        match task_ctx.fetch(&request).await {
            Ok(fresh) if fresh.is_storable() => {
                task_ctx.namespaces.store(role, key, fresh).await;
                task_ctx.metrics.record_revalidation(true);
                Ok(())
            }
            Ok(stale) => {
                debug!(url = %request.url, status = %stale.status, "Revalidation kept cached copy");
                task_ctx.metrics.record_revalidation(false);
                Ok(())
            }
            Err(e) => {
                task_ctx.metrics.record_revalidation(false);
                Err::<(), FetchError>(e)
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        fallback::{FallbackKind, fallback_kind},
        storage::DiskCacheStorage,
        testing::{Harness, ScriptedNetwork, context, key, ok, test_config, url},
    };
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn fetch_on(ctx: &Arc<WorkerContext>, path: &str) -> FetchResponse {
        let target = url(path);
        let classification = ctx.classifier.classify(&target);
        handle(ctx, &FetchRequest::get(target), classification).await
    }

    async fn fetch(harness: &Harness, path: &str) -> FetchResponse {
        fetch_on(&harness.ctx, path).await
    }

    #[tokio::test]
    async fn test_hit_returns_stale_and_revalidates() {
        let harness = Harness::new();
        harness.network.respond(&url("/data/gallery.json"), ok("[1]"));
        assert_eq!(fetch(&harness, "/data/gallery.json").await.body, "[1]");

        harness.network.respond(&url("/data/gallery.json"), ok("[1,2]"));
        let stale = fetch(&harness, "/data/gallery.json").await;
        assert_eq!(stale.body, "[1]");

        harness.ctx.background.settle().await;
        let fresh = fetch(&harness, "/data/gallery.json").await;
        assert_eq!(fresh.body, "[1,2]");

        harness.ctx.background.settle().await;
        let snapshot = harness.ctx.metrics.snapshot();
        assert_eq!(snapshot.revalidations, 2);
        assert_eq!(snapshot.revalidation_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_cached_copy() {
        let harness = Harness::new();
        harness.network.respond(&url("/manifest.json"), ok("{}"));
        fetch(&harness, "/manifest.json").await;

        harness.network.set_offline(true);
        assert_eq!(fetch(&harness, "/manifest.json").await.body, "{}");
        harness.ctx.background.settle().await;

        let cached = harness
            .ctx
            .namespaces
            .lookup(CacheRole::Static, &key("/manifest.json"))
            .await
            .unwrap();
        assert_eq!(cached.body, "{}");
        assert_eq!(harness.ctx.metrics.snapshot().revalidation_failures, 1);
    }

    #[tokio::test]
    async fn test_error_status_returned_unstored() {
        let harness = Harness::new();
        let response = fetch(&harness, "/data/missing.json").await;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(harness.ctx.namespaces.lookup_any(&key("/data/missing.json")).await.is_none());
    }

    #[tokio::test]
    async fn test_partial_revalidation_keeps_cached_copy() {
        let harness = Harness::new();
        harness.network.respond(&url("/data/gallery.json"), ok("[1,2,3]"));
        fetch(&harness, "/data/gallery.json").await;

        harness.network.respond(
            &url("/data/gallery.json"),
            FetchResponse::new(StatusCode::PARTIAL_CONTENT, "[1"),
        );
        fetch(&harness, "/data/gallery.json").await;
        harness.ctx.background.settle().await;

        let cached = harness
            .ctx
            .namespaces
            .lookup(CacheRole::Static, &key("/data/gallery.json"))
            .await
            .unwrap();
        assert_eq!(cached.status, StatusCode::OK);
        assert_eq!(cached.body, "[1,2,3]");
        assert_eq!(harness.ctx.metrics.snapshot().revalidation_failures, 1);
    }

    #[tokio::test]
    async fn test_revalidated_copy_persists_on_disk() {
        let dir = TempDir::new().unwrap();
        let network = ScriptedNetwork::new();
        network.respond(&url("/data/gallery.json"), ok("[1]"));

        {
            let storage = Arc::new(DiskCacheStorage::new(dir.path()).unwrap());
            let ctx = context(test_config(), storage, network.clone());
            assert_eq!(fetch_on(&ctx, "/data/gallery.json").await.body, "[1]");

            network.respond(&url("/data/gallery.json"), ok("[1,2]"));
            assert_eq!(fetch_on(&ctx, "/data/gallery.json").await.body, "[1]");
            ctx.background.settle().await;
        }

        network.set_offline(true);
        let storage = Arc::new(DiskCacheStorage::new(dir.path()).unwrap());
        let ctx = context(test_config(), storage, network.clone());
        let cached = fetch_on(&ctx, "/data/gallery.json").await;
        ctx.background.settle().await;

        assert_eq!(cached.status, StatusCode::OK);
        assert_eq!(cached.body, "[1,2]");
        assert_eq!(ctx.metrics.snapshot().revalidation_failures, 1);
    }

    #[tokio::test]
    async fn test_offline_miss_serves_offline_page() {
        let harness = Harness::new();
        harness.network.set_offline(true);

        let response = fetch(&harness, "/auth_config.json").await;
        assert_eq!(fallback_kind(&response), Some(FallbackKind::Page));
    }
}
