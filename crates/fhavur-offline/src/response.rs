//! Response snapshots returned by strategies and held in cache storage

#![allow(missing_docs)]

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};

/// Origin classification of a response, mirroring what a browser exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseKind {
    /// Same-origin network response
    Basic,
    /// Cross-origin response with readable body
    Cors,
    /// Cross-origin response whose status and body are hidden
    Opaque,
    /// Constructed locally
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL after any transparent redirects
    pub url: String,
    /// Set when the network followed redirects to produce this response
    pub redirected: bool,
    pub kind: ResponseKind,
}

impl FetchResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url: String::new(),
            redirected: false,
            kind: ResponseKind::Default,
        }
    }

    /// Redirect response pointing at `location`
    pub fn redirect(status: StatusCode, location: &str) -> Self {
        let mut response = Self::new(status, Bytes::new());
        if let Ok(value) = HeaderValue::from_str(location) {
            response.headers.insert(header::LOCATION, value);
        }
        response
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Status in the 200-299 range
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    /// 3xx status, or already redirected before reaching the strategy
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection() || self.redirected
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Worth writing to a cache namespace: a complete ok body, or opaque
    /// cross-origin. A 206 only holds the requested byte range.
    pub fn is_storable(&self) -> bool {
        (self.ok() && self.status != StatusCode::PARTIAL_CONTENT) || self.is_opaque()
    }

    /// Copy of this response presented as if fetched from `url` directly
    pub fn rekeyed(&self, url: &str) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            url: url.to_string(),
            redirected: false,
            kind: self.kind,
        }
    }
}
