//! URL classification
//!
//! Decides from a URL alone whether a request may be cached and which
//! resource class it belongs to. Rules are evaluated in a fixed order and the
//! first match wins:
//!
//! 1. `data:` and `blob:` URLs are never cached
//! 2. allow-listed CDN hosts and known library filenames are external
//! 3. any other foreign origin is not cached
//! 4. development and tooling directories are not cached
//! 5. dynamic endpoints (`/api/`, `/auth/`) are not cached
//! 6. `/` and `*.html` are documents
//! 7. known extensions map to asset, stylesheet or data classes
//! 8. everything else is not cached

use crate::{config::OfflineConfig, error::ConfigError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// Logical resource class of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    /// Images, fonts, audio and scripts from the page origin
    Static,
    /// HTML documents
    Html,
    /// Same-origin stylesheets
    Stylesheet,
    /// CDN-hosted or recognised third-party libraries
    External,
    /// Data files that change between deployments (json, manifest, text, xml)
    Data,
    /// Not cacheable
    None,
}

/// Result of classifying a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub cacheable: bool,
    pub resource_class: ResourceClass,
    pub is_external: bool,
}

impl Classification {
    /// Not cacheable
    pub const fn uncacheable() -> Self {
        Self {
            cacheable: false,
            resource_class: ResourceClass::None,
            is_external: false,
        }
    }

    const fn local(resource_class: ResourceClass) -> Self {
        Self {
            cacheable: true,
            resource_class,
            is_external: false,
        }
    }

    const fn external() -> Self {
        Self {
            cacheable: true,
            resource_class: ResourceClass::External,
            is_external: true,
        }
    }
}

/// Pure URL classifier built once from configuration
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    page_origin: Origin,
    external_hosts: Vec<String>,
    library_patterns: Vec<Regex>,
    excluded_dirs: Vec<String>,
    excluded_segments: Vec<String>,
    asset_extensions: Vec<String>,
    stylesheet_extensions: Vec<String>,
    data_extensions: Vec<String>,
    image_extensions: Vec<String>,
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|value| value.to_ascii_lowercase()).collect()
}

impl UrlClassifier {
    /// Compile the classifier; fails on an invalid origin or library pattern.
    pub fn new(config: &OfflineConfig) -> Result<Self, ConfigError> {
        let page_origin = config.origin_url()?.origin();

        let library_patterns = config
            .external_library_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            page_origin,
            external_hosts: lowercase_all(&config.external_hosts),
            library_patterns,
            excluded_dirs: config.excluded_dirs.clone(),
            excluded_segments: config.excluded_segments.clone(),
            asset_extensions: lowercase_all(&config.asset_extensions),
            stylesheet_extensions: lowercase_all(&config.stylesheet_extensions),
            data_extensions: lowercase_all(&config.data_extensions),
            image_extensions: lowercase_all(&config.image_extensions),
        })
    }

    /// Classify `url`. Malformed input is never cacheable.
    pub fn classify(&self, url: &str) -> Classification {
        let Ok(parsed) = Url::parse(url) else {
            tracing::trace!(url, "unparseable URL is not cacheable");
            return Classification::uncacheable();
        };

        let classification = self.classify_parsed(&parsed, url);
        tracing::trace!(
            url,
            cacheable = classification.cacheable,
            class = ?classification.resource_class,
            "classified"
        );
        classification
    }

    fn classify_parsed(&self, url: &Url, raw: &str) -> Classification {
        if matches!(url.scheme(), "data" | "blob") {
            return Classification::uncacheable();
        }

        if self.is_external_library(url, raw) {
            return Classification::external();
        }

        if url.origin() != self.page_origin {
            return Classification::uncacheable();
        }

        if self.is_excluded_path(url.path()) {
            return Classification::uncacheable();
        }

        let path = url.path();
        if path == "/" || path.to_ascii_lowercase().ends_with(".html") {
            return Classification::local(ResourceClass::Html);
        }

        match path_extension(path) {
            Some(ext) if self.asset_extensions.contains(&ext) => {
                Classification::local(ResourceClass::Static)
            }
            Some(ext) if self.stylesheet_extensions.contains(&ext) => {
                Classification::local(ResourceClass::Stylesheet)
            }
            Some(ext) if self.data_extensions.contains(&ext) => {
                Classification::local(ResourceClass::Data)
            }
            _ => Classification::uncacheable(),
        }
    }

    fn is_external_library(&self, url: &Url, raw: &str) -> bool {
        let host_listed = url.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            self.external_hosts.iter().any(|listed| *listed == host)
        });

        host_listed || self.library_patterns.iter().any(|re| re.is_match(raw))
    }

    /// Path lies in an excluded directory or dynamic endpoint
    pub fn is_excluded_path(&self, path: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| path.contains(dir.as_str()))
            || self
                .excluded_segments
                .iter()
                .any(|segment| path.contains(segment.as_str()))
    }

    /// URL path ends in a configured image extension
    pub fn is_image_url(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|parsed| path_extension(parsed.path()))
            .is_some_and(|ext| self.image_extensions.contains(&ext))
    }

    /// `url` shares the page origin
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.page_origin
    }
}

/// Lowercased extension of the last path segment, if it has one
pub fn path_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const ORIGIN: &str = "https://fhavur.example";

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(&OfflineConfig::new().with_page_origin(ORIGIN)).unwrap()
    }

    #[test]
    fn test_data_and_blob_urls() {
        let c = classifier();
        assert!(!c.classify("data:image/png;base64,AAAA").cacheable);
        assert!(!c.classify("blob:https://fhavur.example/1234-5678").cacheable);
    }

    #[test]
    fn test_external_hosts_and_patterns() {
        let c = classifier();

        let cdn = c.classify("https://cdn.jsdelivr.net/npm/canvas-confetti@1.9.2/dist/confetti.browser.min.js");
        assert_eq!(cdn.resource_class, ResourceClass::External);
        assert!(cdn.cacheable && cdn.is_external);

        // Library filename on an unlisted host still counts as external
        let pattern = c.classify("https://static.other-cdn.example/libs/bootstrap.min.css");
        assert_eq!(pattern.resource_class, ResourceClass::External);
        assert!(pattern.is_external);
    }

    #[test]
    fn test_foreign_origin_is_not_cacheable() {
        let c = classifier();
        let classification = c.classify("https://tracker.example.net/pixel.png");
        assert_eq!(classification, Classification::uncacheable());

        // Different scheme or port is a different origin
        assert!(!c.classify("http://fhavur.example/cover.jpg").cacheable);
        assert!(!c.classify("https://fhavur.example:8443/cover.jpg").cacheable);
    }

    #[test]
    fn test_excluded_paths() {
        let c = classifier();
        assert!(!c.classify("https://fhavur.example/node_modules/gsap/index.js").cacheable);
        assert!(!c.classify("https://fhavur.example/.git/HEAD").cacheable);
        assert!(!c.classify("https://fhavur.example/api/wishes.json").cacheable);
        assert!(!c.classify("https://fhavur.example/auth/callback.html").cacheable);
    }

    #[test]
    fn test_documents() {
        let c = classifier();
        assert_eq!(
            c.classify("https://fhavur.example/").resource_class,
            ResourceClass::Html
        );
        assert_eq!(
            c.classify("https://fhavur.example/proposal.html?from=share").resource_class,
            ResourceClass::Html
        );
        // Extension-less pages are left to navigation routing
        assert!(!c.classify("https://fhavur.example/fhavur").cacheable);
    }

    #[test]
    fn test_extension_groups() {
        let c = classifier();
        let cases = [
            ("/images/cake.PNG", ResourceClass::Static),
            ("/fonts/script.woff2", ResourceClass::Static),
            ("/audio/birthday-song.mp3", ResourceClass::Static),
            ("/js/main.js", ResourceClass::Static),
            ("/css/style.css", ResourceClass::Stylesheet),
            ("/data/gallery.json", ResourceClass::Data),
            ("/site.webmanifest", ResourceClass::Data),
        ];
        for (path, expected) in cases {
            let classification = c.classify(&format!("{ORIGIN}{path}"));
            assert!(classification.cacheable, "{path}");
            assert_eq!(classification.resource_class, expected, "{path}");
            assert!(!classification.is_external, "{path}");
        }

        assert!(!c.classify("https://fhavur.example/archive.zip").cacheable);
        assert!(!c.classify("https://fhavur.example/.htaccess").cacheable);
    }

    #[test]
    fn test_malformed_urls() {
        let c = classifier();
        assert_eq!(c.classify(""), Classification::uncacheable());
        assert_eq!(c.classify("::::"), Classification::uncacheable());
        assert_eq!(c.classify("/relative/path.png"), Classification::uncacheable());
    }

    #[test]
    fn test_image_detection() {
        let c = classifier();
        assert!(c.is_image_url("https://fhavur.example/nonexistent.jpg"));
        assert!(!c.is_image_url("https://fhavur.example/app.js"));
        assert!(!c.is_image_url("garbage"));
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension("/a/b.tar.GZ"), Some("gz".to_string()));
        assert_eq!(path_extension("/a/b"), None);
        assert_eq!(path_extension("/a.dir/b"), None);
        assert_eq!(path_extension("/.env"), None);
        assert_eq!(path_extension("/trailing."), None);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut config = OfflineConfig::new();
        config.external_library_patterns = vec!["[".to_string()];
        assert!(UrlClassifier::new(&config).is_err());
    }

    proptest! {
        #[test]
        fn prop_excluded_dirs_never_cacheable(
            dir in prop::sample::select(vec!["/node_modules/", "/.git/", "/.github/", "/.vscode/", "/scripts/dev/", "/tools/"]),
            name in "[a-z]{1,12}",
            ext in prop::sample::select(vec!["png", "css", "json", "html", "js"]),
        ) {
            let c = classifier();
            let url = format!("{ORIGIN}/site{dir}{name}.{ext}");
            // Library filenames such as gsap.js are matched before directories
            prop_assume!(!c.library_patterns.iter().any(|re| re.is_match(&url)));
            prop_assert!(!c.classify(&url).cacheable);
        }

        #[test]
        fn prop_same_origin_assets_are_static(
            dirs in prop::collection::vec("[a-z0-9]{1,8}", 0..4),
            name in "[a-z0-9_]{1,16}",
            ext in prop::sample::select(vec!["png", "jpg", "jpeg", "gif", "webp", "svg", "woff2", "ttf", "mp3", "ogg"]),
        ) {
            let c = classifier();
            let mut path = String::new();
            for dir in &dirs {
                path.push('/');
                path.push_str(dir);
            }
            let url = format!("{ORIGIN}{path}/{name}.{ext}");
            prop_assume!(!c.excluded_dirs.iter().chain(&c.excluded_segments).any(|dir| url.contains(dir.as_str())));
            prop_assume!(!c.library_patterns.iter().any(|re| re.is_match(&url)));
            let classification = c.classify(&url);
            prop_assert!(classification.cacheable);
            prop_assert_eq!(classification.resource_class, ResourceClass::Static);
        }

        #[test]
        fn prop_classify_never_panics(input in ".{0,64}") {
            let _ = classifier().classify(&input);
        }
    }
}
