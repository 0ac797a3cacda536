//! Cache-first strategy for stylesheets and external libraries
//!
//! Same shape as the static asset strategy; on total failure the page gets an
//! empty stylesheet so layout degrades instead of blocking on a dead request.

use super::{WorkerContext, cache_first};
use crate::{
    classify::Classification, fallback::offline_stylesheet, request::FetchRequest,
    response::FetchResponse,
};
use std::sync::Arc;
use tracing::{error, warn};

/// Name of the first critical library mentioned in `url`
fn critical_library<'a>(ctx: &'a WorkerContext, url: &str) -> Option<&'a str> {
    let url = url.to_ascii_lowercase();
    ctx.config
        .critical_libraries
        .iter()
        .find(|library| url.contains(&library.to_ascii_lowercase()))
        .map(String::as_str)
}

pub async fn handle(
    ctx: &Arc<WorkerContext>,
    request: &FetchRequest,
    classification: Classification,
) -> FetchResponse {
    cache_first(ctx, request, classification, |e| {
        match critical_library(ctx, &request.url) {
            Some(library) => {
                error!(url = %request.url, library, error = %e, "Critical library unavailable offline");
            }
            None => warn!(url = %request.url, error = %e, "Stylesheet unavailable offline"),
        }
        offline_stylesheet()
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        namespace::CacheRole,
        request::RequestKey,
        response::ResponseKind,
        testing::{Harness, ok, url},
    };
    use http::StatusCode;
    use pretty_assertions::assert_eq;

    const BOOTSTRAP: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";

    async fn fetch(harness: &Harness, target: &str) -> FetchResponse {
        let request = FetchRequest::get(target);
        let classification = harness.ctx.classifier.classify(target);
        handle(&harness.ctx, &request, classification).await
    }

    #[tokio::test]
    async fn test_external_stylesheet_cached_in_dynamic() {
        let harness = Harness::new();
        harness
            .network
            .respond(BOOTSTRAP, ok(".btn{}").with_kind(ResponseKind::Cors));

        let first = fetch(&harness, BOOTSTRAP).await;
        harness.network.set_offline(true);
        let second = fetch(&harness, BOOTSTRAP).await;

        assert_eq!(first.body, ".btn{}");
        assert_eq!(second.body, ".btn{}");
        assert_eq!(harness.network.call_count(), 1);
        assert!(
            harness
                .ctx
                .namespaces
                .lookup(CacheRole::Dynamic, &RequestKey::for_url(BOOTSTRAP))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_local_stylesheet_cached_in_static() {
        let harness = Harness::new();
        harness.network.respond(&url("/css/birthday.css"), ok("h1{}"));

        fetch(&harness, &url("/css/birthday.css")).await;
        assert!(
            harness
                .ctx
                .namespaces
                .lookup(CacheRole::Static, &RequestKey::for_url(&url("/css/birthday.css")))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_offline_stylesheet_fallback() {
        let harness = Harness::new();
        harness.network.set_offline(true);

        for target in [BOOTSTRAP.to_string(), url("/css/theme.css")] {
            let response = fetch(&harness, &target).await;
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
            assert!(response.content_type().unwrap().starts_with("text/css"));
        }
        assert_eq!(harness.ctx.metrics.snapshot().fallbacks.stylesheet, 2);
    }

    #[test]
    fn test_critical_library_detection() {
        let harness = Harness::new();
        assert_eq!(critical_library(&harness.ctx, BOOTSTRAP), Some("bootstrap"));
        assert_eq!(
            critical_library(
                &harness.ctx,
                "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.0/css/all.min.css"
            ),
            Some("font-awesome")
        );
        assert_eq!(critical_library(&harness.ctx, &url("/css/theme.css")), None);
    }
}
