//! Network-first strategy for documents
//!
//! Same-origin redirects are followed here rather than by the network layer
//! so the final page can be stored under the URL the user actually asked
//! for. When the network is gone the stored copy is looked up under a few
//! spellings of the URL (`/page`, `/page.html`, `/dir/index.html`) before
//! falling back to the generated offline page.

use super::WorkerContext;
use crate::{
    fallback::offline_page,
    namespace::CacheRole,
    request::{FetchRequest, RequestKey, normalize_url},
    response::FetchResponse,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub async fn handle(ctx: &Arc<WorkerContext>, request: &FetchRequest) -> FetchResponse {
    match ctx.fetch(request).await {
        Ok(response) if response.status.is_redirection() => {
            follow_redirects(ctx, request, response).await
        }
        Ok(response) => {
            store_document(ctx, request, &response).await;
            response
        }
        Err(_) => offline_document(ctx, request).await,
    }
}

/// Chase same-origin redirects up to the configured hop limit
async fn follow_redirects(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    first: FetchResponse,
) -> FetchResponse {
    let Ok(mut base) = Url::parse(&request.url) else {
        return first;
    };
    let mut current = first;

    for hop in 0..=ctx.config.max_redirects {
        let Some(target) = current.location().and_then(|location| base.join(location).ok()) else {
            debug!(url = %request.url, "Redirect without usable Location, returning as-is");
            return current;
        };

        if !ctx.classifier.is_same_origin(&target) {
            debug!(url = %request.url, target = %target, "Cross-origin redirect, returning as-is");
            return current;
        }

        if hop == ctx.config.max_redirects {
            warn!(url = %request.url, hops = hop, "Redirect limit reached");
            return current;
        }

        match ctx.fetch(&request.retarget(target.as_str())).await {
            Ok(next) if next.status.is_redirection() => {
                current = next;
                base = target;
            }
            Ok(mut next) => {
                next.redirected = true;
                if next.url.is_empty() {
                    next.url = target.into();
                }
                store_document(ctx, request, &next).await;
                return next;
            }
            Err(_) => return offline_document(ctx, request).await,
        }
    }

    current
}

/// Cache an ok document under the originally requested URL
async fn store_document(ctx: &WorkerContext, request: &FetchRequest, response: &FetchResponse) {
    if !response.is_storable() || response.is_opaque() {
        return;
    }

    let Ok(url) = Url::parse(&request.url) else {
        return;
    };
    if !ctx.classifier.is_same_origin(&url) || ctx.classifier.is_excluded_path(url.path()) {
        debug!(url = %request.url, "Document not eligible for caching");
        return;
    }

    let key = RequestKey::for_url(&request.url);
    let moved = !response.url.is_empty() && normalize_url(&response.url) != key.url();
    let stored = if response.is_redirect() || moved {
        response.rekeyed(key.url())
    } else {
        response.clone()
    };

    ctx.namespaces.store(CacheRole::Dynamic, key, stored).await;
}

/// Alternate spellings of a document URL, most specific first
pub fn document_variants(url: &str) -> Vec<String> {
    let exact = normalize_url(url);
    let Ok(parsed) = Url::parse(&exact) else {
        return vec![exact];
    };

    let path = parsed.path().to_string();
    let lower = path.to_ascii_lowercase();
    let mut alternates = Vec::new();
    if lower.ends_with(".html") {
        if let Some(stripped) = path.get(..path.len() - ".html".len()) {
            alternates.push(stripped.to_string());
        }
        if lower.ends_with("index.html")
            && let Some(dir) = path.get(..path.len() - "index.html".len())
        {
            alternates.push(dir.to_string());
        }
    } else if path.ends_with('/') {
        alternates.push(format!("{path}index.html"));
    } else {
        alternates.push(format!("{path}.html"));
    }

    let mut variants = vec![exact];
    for alternate in alternates {
        if alternate.is_empty() {
            continue;
        }
        let mut candidate = parsed.clone();
        candidate.set_path(&alternate);
        let candidate: String = candidate.into();
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

async fn offline_document(ctx: &WorkerContext, request: &FetchRequest) -> FetchResponse {
    for variant in document_variants(&request.url) {
        let key = RequestKey::for_url(&variant);
        if let Some(hit) = ctx.namespaces.lookup_any(&key).await {
            ctx.metrics.record_hit();
            info!(url = %request.url, served = %variant, "Serving cached document offline");
            return hit;
        }
    }

    ctx.metrics.record_miss();
    info!(url = %request.url, "No cached document, serving offline page");
    ctx.serve_fallback(offline_page(&ctx.config.site_title, &request.url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        fallback::{FallbackKind, fallback_kind},
        storage::DiskCacheStorage,
        testing::{Harness, ScriptedNetwork, context, html, key, ok, test_config, url},
    };
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_document_variants() {
        assert_eq!(
            document_variants("http://localhost:8080/fhavur.html"),
            vec![
                "http://localhost:8080/fhavur.html",
                "http://localhost:8080/fhavur"
            ]
        );
        assert_eq!(
            document_variants("http://localhost:8080/fhavur#top"),
            vec![
                "http://localhost:8080/fhavur",
                "http://localhost:8080/fhavur.html"
            ]
        );
        assert_eq!(
            document_variants("http://localhost:8080/gallery/"),
            vec![
                "http://localhost:8080/gallery/",
                "http://localhost:8080/gallery/index.html"
            ]
        );
        assert_eq!(
            document_variants("http://localhost:8080/index.html"),
            vec![
                "http://localhost:8080/index.html",
                "http://localhost:8080/index",
                "http://localhost:8080/"
            ]
        );
        assert_eq!(
            document_variants("http://localhost:8080/Gallery.HTML"),
            vec![
                "http://localhost:8080/Gallery.HTML",
                "http://localhost:8080/Gallery"
            ]
        );
        assert_eq!(
            document_variants("http://localhost:8080/proposal/Index.Html"),
            vec![
                "http://localhost:8080/proposal/Index.Html",
                "http://localhost:8080/proposal/Index",
                "http://localhost:8080/proposal/"
            ]
        );
        assert_eq!(document_variants("not a url"), vec!["not a url"]);
    }

    #[tokio::test]
    async fn test_network_first_stores_in_dynamic() {
        let harness = Harness::new();
        harness.network.respond(&url("/birthday.html"), html("<h1>v1</h1>"));

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/birthday.html"))).await;
        assert_eq!(response.body, "<h1>v1</h1>");

        // Network-first: a newer version replaces the cached one
        harness.network.respond(&url("/birthday.html"), html("<h1>v2</h1>"));
        handle(&harness.ctx, &FetchRequest::navigate(url("/birthday.html"))).await;

        let cached = harness
            .ctx
            .namespaces
            .lookup(CacheRole::Dynamic, &key("/birthday.html"))
            .await
            .unwrap();
        assert_eq!(cached.body, "<h1>v2</h1>");
    }

    #[tokio::test]
    async fn test_redirect_normalization_round_trip() {
        let harness = Harness::new();
        harness.network.respond(
            &url("/birthday"),
            FetchResponse::redirect(StatusCode::MOVED_PERMANENTLY, "/birthday.html"),
        );
        harness.network.respond(&url("/birthday.html"), html("<h1>Happy birthday</h1>"));

        let online = handle(&harness.ctx, &FetchRequest::navigate(url("/birthday"))).await;
        assert_eq!(online.status, StatusCode::OK);
        assert_eq!(online.body, "<h1>Happy birthday</h1>");
        assert!(online.redirected);

        let stored = harness
            .ctx
            .namespaces
            .lookup(CacheRole::Dynamic, &key("/birthday"))
            .await
            .unwrap();
        assert_eq!(stored.url, url("/birthday"));
        assert!(!stored.redirected);

        harness.network.set_offline(true);
        let offline = handle(&harness.ctx, &FetchRequest::navigate(url("/birthday"))).await;
        assert_eq!(offline.body, "<h1>Happy birthday</h1>");
        assert_eq!(fallback_kind(&offline), None);
    }

    #[tokio::test]
    async fn test_redirect_chain_is_followed() {
        let harness = Harness::new();
        harness.network.respond(
            &url("/proposal"),
            FetchResponse::redirect(StatusCode::FOUND, "/proposal/"),
        );
        harness.network.respond(
            &url("/proposal/"),
            FetchResponse::redirect(StatusCode::FOUND, "index.html"),
        );
        harness.network.respond(&url("/proposal/index.html"), html("yes"));

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/proposal"))).await;
        assert_eq!(response.body, "yes");
        assert_eq!(harness.network.call_count(), 3);
        assert!(
            harness
                .ctx
                .namespaces
                .lookup(CacheRole::Dynamic, &key("/proposal"))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_redirect_loop_stops_at_limit() {
        let harness = Harness::with_config(test_config().with_max_redirects(2));
        harness
            .network
            .respond(&url("/a"), FetchResponse::redirect(StatusCode::FOUND, "/b"));
        harness
            .network
            .respond(&url("/b"), FetchResponse::redirect(StatusCode::FOUND, "/a"));

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/a"))).await;
        assert!(response.status.is_redirection());
        // Initial request plus two followed hops
        assert_eq!(harness.network.call_count(), 3);
        assert!(harness.ctx.namespaces.lookup_any(&key("/a")).await.is_none());
    }

    #[tokio::test]
    async fn test_cross_origin_redirect_returned_unchanged() {
        let harness = Harness::new();
        harness.network.respond(
            &url("/login"),
            FetchResponse::redirect(StatusCode::FOUND, "https://fhavur.eu.auth0.com/authorize"),
        );

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/login"))).await;
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location(), Some("https://fhavur.eu.auth0.com/authorize"));
        assert_eq!(harness.network.call_count(), 1);
        assert!(harness.ctx.namespaces.lookup_any(&key("/login")).await.is_none());
    }

    #[tokio::test]
    async fn test_redirect_without_location_returned_unchanged() {
        let harness = Harness::new();
        harness
            .network
            .respond(&url("/odd"), FetchResponse::new(StatusCode::FOUND, ""));

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/odd"))).await;
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(harness.network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_redirected_flag_rekeys_stored_copy() {
        let harness = Harness::new();
        let mut transparent = html("<p>gallery</p>").with_url(url("/gallery/index.html"));
        transparent.redirected = true;
        harness.network.respond(&url("/gallery"), transparent);

        handle(&harness.ctx, &FetchRequest::navigate(url("/gallery"))).await;

        let stored = harness.ctx.namespaces.lookup_any(&key("/gallery")).await.unwrap();
        assert_eq!(stored.url, url("/gallery"));
        assert!(!stored.redirected);
    }

    #[tokio::test]
    async fn test_rekeyed_redirect_survives_restart_on_disk() {
        let dir = TempDir::new().unwrap();
        let network = ScriptedNetwork::new();
        network.respond(
            &url("/birthday"),
            FetchResponse::redirect(StatusCode::MOVED_PERMANENTLY, "/birthday.html"),
        );
        network.respond(&url("/birthday.html"), html("<h1>Happy birthday</h1>"));

        {
            let storage = Arc::new(DiskCacheStorage::new(dir.path()).unwrap());
            let ctx = context(test_config(), storage, network.clone());
            let online = handle(&ctx, &FetchRequest::navigate(url("/birthday"))).await;
            assert!(online.redirected);
        }

        network.set_offline(true);
        let storage = Arc::new(DiskCacheStorage::new(dir.path()).unwrap());
        let ctx = context(test_config(), storage, network.clone());
        let offline = handle(&ctx, &FetchRequest::navigate(url("/birthday"))).await;

        assert_eq!(fallback_kind(&offline), None);
        assert_eq!(offline.body, "<h1>Happy birthday</h1>");
        assert_eq!(offline.url, url("/birthday"));
        assert!(!offline.redirected);
        assert_eq!(offline.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_offline_uppercase_extension_finds_stored_page() {
        let harness = Harness::new();
        harness.network.respond(&url("/Gallery"), html("<p>gallery</p>"));
        handle(&harness.ctx, &FetchRequest::navigate(url("/Gallery"))).await;

        harness.network.set_offline(true);
        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/Gallery.HTML"))).await;
        assert_eq!(response.body, "<p>gallery</p>");
    }

    #[tokio::test]
    async fn test_offline_html_variant_lookup() {
        let harness = Harness::new();
        harness.network.respond(&url("/fhavur"), html("<p>fhavur</p>"));
        handle(&harness.ctx, &FetchRequest::navigate(url("/fhavur"))).await;

        harness.network.set_offline(true);
        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/fhavur.html"))).await;
        assert_eq!(response.body, "<p>fhavur</p>");
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_static_namespace() {
        let harness = Harness::new();
        harness
            .ctx
            .namespaces
            .store(CacheRole::Static, key("/gallery.html"), html("<p>precached</p>"))
            .await;
        harness.network.set_offline(true);

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/gallery"))).await;
        assert_eq!(response.body, "<p>precached</p>");
    }

    #[tokio::test]
    async fn test_offline_without_cache_serves_generated_page() {
        let harness = Harness::new();
        harness.network.set_offline(true);

        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/proposal.html"))).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fallback_kind(&response), Some(FallbackKind::Page));
        assert_eq!(harness.ctx.metrics.snapshot().fallbacks.page, 1);
    }

    #[tokio::test]
    async fn test_error_documents_are_not_cached() {
        let harness = Harness::new();
        let response = handle(&harness.ctx, &FetchRequest::navigate(url("/missing.html"))).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(harness.ctx.namespaces.lookup_any(&key("/missing.html")).await.is_none());
    }

    #[tokio::test]
    async fn test_excluded_paths_are_not_cached() {
        let harness = Harness::new();
        harness.network.respond(&url("/auth/callback"), ok("signed in"));

        handle(&harness.ctx, &FetchRequest::navigate(url("/auth/callback"))).await;
        assert!(harness.ctx.namespaces.lookup_any(&key("/auth/callback")).await.is_none());
    }
}
