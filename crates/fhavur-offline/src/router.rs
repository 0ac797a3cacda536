//! Strategy selection
//!
//! One-shot and pure: [`route`] looks at the method, the navigation intent and
//! the URL classification and names exactly one strategy. It never retries and
//! never touches the network or the cache.

use crate::{
    classify::{Classification, ResourceClass, UrlClassifier},
    request::FetchRequest,
};
use http::Method;
use serde::Serialize;
use tracing::debug;

/// Strategy a request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dispatch {
    /// Plain network fetch, nothing cached
    Passthrough,
    /// Cache-first with image/resource fallback
    StaticAsset,
    /// Cache-first with empty-stylesheet fallback
    Stylesheet,
    /// Network-first with redirect normalization and offline page
    Document,
    /// Cached copy now, fresh copy for next time
    StaleWhileRevalidate,
}

/// Routing decision plus the classification it was based on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub dispatch: Dispatch,
    pub classification: Classification,
}

/// Pick the strategy for `request`
pub fn route(classifier: &UrlClassifier, request: &FetchRequest) -> Route {
    let classification = classifier.classify(&request.url);

    let dispatch = if request.method != Method::GET {
        Dispatch::Passthrough
    } else if request.is_navigation() {
        Dispatch::Document
    } else if !classification.cacheable {
        Dispatch::Passthrough
    } else {
        match classification.resource_class {
            ResourceClass::Static => Dispatch::StaticAsset,
            ResourceClass::Stylesheet | ResourceClass::External => Dispatch::Stylesheet,
            ResourceClass::Html => Dispatch::Document,
            ResourceClass::Data => Dispatch::StaleWhileRevalidate,
            ResourceClass::None => Dispatch::Passthrough,
        }
    };

    debug!(method = %request.method, url = %request.url, ?dispatch, "Routed request");
    Route {
        dispatch,
        classification,
    }
}
