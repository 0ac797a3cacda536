//! Offline layer configuration
//!
//! Everything the worker needs to know about the site is injected through
//! [`OfflineConfig`]: the cache version, the page origin, which hosts count as
//! external libraries, which paths must never be cached and how large the
//! static namespace may grow. Defaults describe the celebratory site itself.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for the offline caching layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Prefix shared by every namespace this worker owns
    pub cache_prefix: String,
    /// Deployment version tag; bumping it supersedes all existing namespaces
    pub cache_version: String,
    /// Origin the pages are served from
    pub page_origin: String,
    /// Paths (or absolute URLs) pre-cached into the static namespace at install
    pub essential_urls: Vec<String>,
    /// CDN hosts whose responses are cached as external libraries
    pub external_hosts: Vec<String>,
    /// Regexes matched against the full URL to detect external libraries
    pub external_library_patterns: Vec<String>,
    /// Development and tooling directories that are never cached
    pub excluded_dirs: Vec<String>,
    /// Path segments for dynamic endpoints that are never cached
    pub excluded_segments: Vec<String>,
    /// Extensions served cache-first from the static namespace
    pub asset_extensions: Vec<String>,
    /// Extensions served by the stylesheet strategy
    pub stylesheet_extensions: Vec<String>,
    /// Extensions served stale-while-revalidate
    pub data_extensions: Vec<String>,
    /// Extensions that get the placeholder image when offline
    pub image_extensions: Vec<String>,
    /// Library names whose stylesheet failures are logged at error level
    pub critical_libraries: Vec<String>,
    /// Maximum entries kept in the static namespace after trimming
    pub static_cache_limit: usize,
    /// Same-origin redirect hops followed for documents
    pub max_redirects: usize,
    /// Shown on the generated offline page
    pub site_title: String,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "fhavur".to_string(),
            cache_version: "v2".to_string(),
            page_origin: "http://localhost:8080".to_string(),
            essential_urls: strings(&[
                "/",
                "/index.html",
                "/birthday.html",
                "/proposal.html",
                "/gallery.html",
                "/fhavur.html",
                "/manifest.json",
                "/images/icon-192.png",
                "/images/icon-512.png",
                "/images/cover.jpg",
                "/images/cake.png",
                "/audio/birthday-song.mp3",
                "/data/gallery.json",
                "/auth_config.json",
            ]),
            external_hosts: strings(&[
                "cdn.jsdelivr.net",
                "cdnjs.cloudflare.com",
                "unpkg.com",
                "code.jquery.com",
                "fonts.googleapis.com",
                "fonts.gstatic.com",
                "cdn.auth0.com",
            ]),
            external_library_patterns: strings(&[
                r"bootstrap(\.bundle)?(\.min)?\.(css|js)(\?.*)?$",
                r"jquery(-\d+\.\d+\.\d+)?(\.min)?\.js(\?.*)?$",
                r"gsap(\.min)?\.js(\?.*)?$",
                r"animate(\.min)?\.css(\?.*)?$",
                r"font-?awesome",
                r"canvas-confetti",
                r"aos(\.min)?\.(css|js)(\?.*)?$",
            ]),
            excluded_dirs: strings(&[
                "/node_modules/",
                "/.git/",
                "/.github/",
                "/.vscode/",
                "/scripts/dev/",
                "/tools/",
            ]),
            excluded_segments: strings(&["/api/", "/auth/"]),
            asset_extensions: strings(&[
                "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp", "woff", "woff2",
                "ttf", "otf", "eot", "mp3", "wav", "ogg", "m4a", "js", "mjs",
            ]),
            stylesheet_extensions: strings(&["css"]),
            data_extensions: strings(&["json", "webmanifest", "txt", "xml"]),
            image_extensions: strings(&[
                "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp",
            ]),
            critical_libraries: strings(&["bootstrap", "font-awesome", "fontawesome", "gsap"]),
            static_cache_limit: 60,
            max_redirects: 5,
            site_title: "Fhavur".to_string(),
        }
    }
}

impl OfflineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = version.into();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_page_origin(mut self, origin: impl Into<String>) -> Self {
        self.page_origin = origin.into();
        self
    }

    pub fn with_essential_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.essential_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_external_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.external_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_static_cache_limit(mut self, limit: usize) -> Self {
        self.static_cache_limit = limit;
        self
    }

    pub fn with_max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = hops;
        self
    }

    /// Parsed page origin
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.page_origin)
            .map_err(|_| ConfigError::InvalidOrigin(self.page_origin.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(self.page_origin.clone()));
        }
        Ok(url)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_ok = |value: &str| {
            !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_'))
        };

        if !name_ok(&self.cache_prefix) {
            return Err(ConfigError::InvalidValue {
                field: "cache_prefix",
                reason: format!("'{}' must be non-empty [A-Za-z0-9._]", self.cache_prefix),
            });
        }

        if !name_ok(&self.cache_version) {
            return Err(ConfigError::InvalidValue {
                field: "cache_version",
                reason: format!("'{}' must be non-empty [A-Za-z0-9._]", self.cache_version),
            });
        }

        if self.static_cache_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "static_cache_limit",
                reason: "must be greater than 0".to_string(),
            });
        }

        self.origin_url()?;

        for pattern in &self.external_library_patterns {
            regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        Ok(())
    }
}
