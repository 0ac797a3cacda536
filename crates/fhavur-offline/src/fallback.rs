//! Responses synthesized when neither network nor cache can answer

use crate::response::FetchResponse;
use http::{HeaderName, HeaderValue, StatusCode, header};
use serde::Serialize;

/// Marks every synthesized response
pub const OFFLINE_FALLBACK_HEADER: &str = "x-offline-fallback";

/// Which fallback was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackKind {
    /// Generated offline HTML page
    Page,
    /// SVG placeholder for images
    Image,
    /// 408 plain-text body for any other resource
    Resource,
    /// Empty stylesheet
    Stylesheet,
}

impl FallbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "generated",
            Self::Image => "placeholder",
            Self::Resource => "unavailable",
            Self::Stylesheet => "empty-stylesheet",
        }
    }
}

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300" role="img" aria-label="Image unavailable offline">
  <rect width="400" height="300" fill="#fde2e4"/>
  <circle cx="200" cy="130" r="42" fill="none" stroke="#e5989b" stroke-width="6"/>
  <path d="M170 210h60" stroke="#e5989b" stroke-width="6" stroke-linecap="round"/>
  <text x="200" y="260" font-family="sans-serif" font-size="18" fill="#b5838d" text-anchor="middle">Image unavailable offline</text>
</svg>
"##;

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn synthesized(
    status: StatusCode,
    content_type: &'static str,
    kind: FallbackKind,
    body: impl Into<bytes::Bytes>,
) -> FetchResponse {
    FetchResponse::new(status, body)
        .with_header(header::CONTENT_TYPE, HeaderValue::from_static(content_type))
        .with_header(
            HeaderName::from_static(OFFLINE_FALLBACK_HEADER),
            HeaderValue::from_static(kind.as_str()),
        )
}

/// Offline page for a document that could not be loaded
pub fn offline_page(site_title: &str, url: &str) -> FetchResponse {
    let title = escape_html(site_title);
    let url = escape_html(url);
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} · Offline</title>
  <style>
    body {{ font-family: system-ui, sans-serif; background: #fff5f7; color: #6d597a;
           display: flex; min-height: 100vh; align-items: center; justify-content: center; margin: 0; }}
    main {{ text-align: center; padding: 2rem; max-width: 32rem; }}
    h1 {{ font-size: 1.8rem; margin-bottom: 0.5rem; }}
    a {{ display: inline-block; margin-top: 1.5rem; padding: 0.6rem 1.4rem; border-radius: 999px;
        background: #e5989b; color: #fff; text-decoration: none; }}
  </style>
</head>
<body>
  <main>
    <h1>You are offline</h1>
    <p>{title} could not reach the network and this page has not been saved yet.</p>
    <p><small>{url}</small></p>
    <a href="{url}">Try again</a>
  </main>
</body>
</html>
"#
    );

    synthesized(
        StatusCode::OK,
        "text/html; charset=utf-8",
        FallbackKind::Page,
        body,
    )
    .with_header(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    )
}

pub fn image_placeholder() -> FetchResponse {
    synthesized(
        StatusCode::OK,
        "image/svg+xml",
        FallbackKind::Image,
        PLACEHOLDER_SVG,
    )
}

pub fn offline_resource() -> FetchResponse {
    synthesized(
        StatusCode::REQUEST_TIMEOUT,
        "text/plain; charset=utf-8",
        FallbackKind::Resource,
        "Resource unavailable offline",
    )
}

pub fn offline_stylesheet() -> FetchResponse {
    synthesized(
        StatusCode::SERVICE_UNAVAILABLE,
        "text/css; charset=utf-8",
        FallbackKind::Stylesheet,
        "/* stylesheet unavailable offline */\n",
    )
}

/// Fallback kind of a response, if it was synthesized here
pub fn fallback_kind(response: &FetchResponse) -> Option<FallbackKind> {
    let value = response.headers.get(OFFLINE_FALLBACK_HEADER)?;
    [
        FallbackKind::Page,
        FallbackKind::Image,
        FallbackKind::Resource,
        FallbackKind::Stylesheet,
    ]
    .into_iter()
    .find(|kind| value.as_bytes() == kind.as_str().as_bytes())
}
