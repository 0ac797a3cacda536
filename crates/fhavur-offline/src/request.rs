//! Intercepted request model and cache key derivation

#![allow(missing_docs)]

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// How the request was issued by the page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl RequestMode {
    /// Map a `Sec-Fetch-Mode` header value
    pub fn from_fetch_mode(value: &str) -> Self {
        match value.trim() {
            "navigate" => Self::Navigate,
            "same-origin" => Self::SameOrigin,
            "no-cors" => Self::NoCors,
            _ => Self::Cors,
        }
    }
}

/// What the fetched resource will be used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestDestination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Audio,
    Video,
    Manifest,
    #[default]
    Unknown,
}

impl RequestDestination {
    /// Map a `Sec-Fetch-Dest` header value
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim() {
            "document" | "iframe" | "frame" => Self::Document,
            "script" | "worker" | "sharedworker" => Self::Script,
            "style" => Self::Style,
            "image" => Self::Image,
            "font" => Self::Font,
            "audio" | "track" => Self::Audio,
            "video" => Self::Video,
            "manifest" => Self::Manifest,
            _ => Self::Unknown,
        }
    }
}

/// A request intercepted by the controller
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: RequestMode,
    pub destination: RequestDestination,
}

impl FetchRequest {
    /// Plain GET resource request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Top-level navigation request
    pub fn navigate(url: impl Into<String>) -> Self {
        let mut request = Self::get(url);
        request.mode = RequestMode::Navigate;
        request.destination = RequestDestination::Document;
        request
            .headers
            .insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        request
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            mode: RequestMode::default(),
            destination: RequestDestination::default(),
        }
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// `Accept` header lists `text/html`
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("text/html"))
    }

    /// Navigation intent: navigate mode or an HTML `Accept` header
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.accepts_html()
    }

    /// Same request aimed at another URL, used when following redirects
    pub fn retarget(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: self.headers.clone(),
            body: Bytes::new(),
            mode: self.mode,
            destination: self.destination,
        }
    }
}

/// Cache identity of a request: method plus normalized URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    /// Key for a GET of `url`
    pub fn for_url(url: &str) -> Self {
        Self {
            method: Method::GET.as_str().to_string(),
            url: normalize_url(url),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Parse, drop the fragment and re-serialize; unparseable input is kept verbatim.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.to_string(),
    }
}
