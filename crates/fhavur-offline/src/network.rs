//! Network access used by the strategies
//!
//! [`Network`] is the only way strategies reach the origin. [`HttpNetwork`]
//! is the production implementation; redirects are never followed
//! automatically so the document strategy can see and normalize them.

use crate::{
    error::{FetchError, FetchResult},
    request::FetchRequest,
    response::{FetchResponse, ResponseKind},
};
use async_trait::async_trait;
use http::{HeaderMap, header};
use std::time::Duration;
use tracing::{debug, trace};
use url::{Origin, Url};

/// Performs a single network fetch
#[async_trait]
pub trait Network: Send + Sync {
    /// Resolve with any HTTP status; `Err` only for transport failures
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse>;
}

/// Drops connection-scoped headers before forwarding
fn strip_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        header::HOST,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    // Let the client negotiate compression so bodies arrive decoded
    headers.remove(header::ACCEPT_ENCODING);
    headers
}

/// Cached bodies are stored decoded; length and encoding are recomputed by
/// whoever serves them.
fn strip_response_headers(headers: &mut HeaderMap) {
    for name in [
        header::CONTENT_ENCODING,
        header::CONTENT_LENGTH,
        header::TRANSFER_ENCODING,
        header::CONNECTION,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// `reqwest`-backed network
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    page_origin: Origin,
}

impl HttpNetwork {
    /// Build a client for pages served from `page_origin`
    pub fn new(page_origin: &Url, timeout: Duration) -> FetchResult<Self> {
        // Idempotent; the first installed provider wins
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("fhavur-offline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            page_origin: page_origin.origin(),
        })
    }

    fn map_error(url: &str, error: &reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            FetchError::Offline {
                url: url.to_string(),
            }
        } else {
            FetchError::transport(url, error.to_string())
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<FetchResponse> {
        let url = Url::parse(&request.url).map_err(|_| FetchError::InvalidUrl(request.url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.url.clone()));
        }

        trace!(method = %request.method, url = %url, "Network fetch");

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(strip_request_headers(&request.headers));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            debug!(url = %request.url, error = %e, "Network fetch failed");
            Self::map_error(&request.url, &e)
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let mut headers = response.headers().clone();
        strip_response_headers(&mut headers);

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&request.url, &e))?;

        let kind = if final_url.origin() == self.page_origin {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };

        Ok(FetchResponse {
            status,
            headers,
            body,
            url: final_url.into(),
            redirected: false,
            kind,
        })
    }
}
