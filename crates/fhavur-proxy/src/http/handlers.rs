//! HTTP request handlers for worker control and intercepted fetches.

use crate::server::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use fhavur_offline::{
    ControlMessage, FetchError, FetchRequest, FetchResponse, LogLevel, MessageOutcome,
    RequestDestination, RequestMode, SyncOutcome, WorkerState, stats::MetricsSnapshot,
};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Handle POST /_worker/message.
///
/// Accepts a JSON `ControlMessage` and replies with its outcome.
pub async fn handle_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ControlMessage>,
) -> Json<MessageOutcome> {
    tracing::debug!("Handling control message: {:?}", message);
    Json(state.controller().handle_message(message))
}

/// Handle POST /_worker/sync/{tag}.
pub async fn handle_sync(
    Path(tag): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<SyncOutcome> {
    Json(state.controller().handle_sync(&tag).await)
}

/// Body of GET /_worker/stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Active cache version
    pub version: String,
    /// Lifecycle phase
    pub state: WorkerState,
    /// Runtime log level requested by pages
    pub log_level: LogLevel,
    /// Share of cache lookups answered from cache
    pub hit_rate: f64,
    /// Offline fallbacks served, all kinds
    pub fallbacks_served: u64,
    /// Background tasks still running
    pub background_pending: usize,
    /// Fetch counters
    pub metrics: MetricsSnapshot,
}

/// Handle GET /_worker/stats.
pub async fn handle_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let controller = state.controller();
    let metrics = controller.metrics();
    Json(StatsResponse {
        version: controller.version().to_string(),
        state: controller.state(),
        log_level: controller.log_level(),
        hit_rate: metrics.hit_rate(),
        fallbacks_served: metrics.fallbacks.total(),
        background_pending: controller.pending_background(),
        metrics,
    })
}

/// Handle every other request as an intercepted fetch against the upstream.
///
/// # Errors
///
/// Returns `AppError` if the path cannot be mapped onto the upstream or a
/// passthrough request fails.
pub async fn handle_fetch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = fetch_request(state.upstream(), method, &uri, headers, body)?;
    tracing::trace!("Intercepted {} {}", request.method, request.url);

    let response = state.controller().handle_fetch(request).await?;
    Ok(into_http_response(response, state.upstream()))
}

/// Map an incoming proxy request onto the upstream origin.
///
/// `Sec-Fetch-Mode` and `Sec-Fetch-Dest` carry the browser's intent.
pub fn fetch_request(
    upstream: &Url,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<FetchRequest, AppError> {
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = upstream
        .join(path)
        .map_err(|e| AppError::BadRequest(format!("Invalid request path {path}: {e}")))?;

    // `//host/...` would otherwise escape the upstream
    if url.origin() != upstream.origin() {
        return Err(AppError::BadRequest(format!(
            "Request path {path} leaves the upstream origin"
        )));
    }

    let mode = header_str(&headers, "sec-fetch-mode")
        .map(RequestMode::from_fetch_mode)
        .unwrap_or_default();
    let destination = header_str(&headers, "sec-fetch-dest")
        .map(RequestDestination::from_fetch_dest)
        .unwrap_or_default();

    let mut request = FetchRequest::new(method, url.as_str())
        .with_mode(mode)
        .with_destination(destination)
        .with_body(body);
    request.headers = headers;
    Ok(request)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Convert a controller response, pointing upstream redirects back at the proxy.
pub fn into_http_response(response: FetchResponse, upstream: &Url) -> Response {
    let FetchResponse {
        status,
        mut headers,
        body,
        ..
    } = response;

    if let Some(relative) = header_str(&headers, header::LOCATION.as_str())
        .and_then(|location| relative_location(location, upstream))
        && let Ok(value) = HeaderValue::from_str(&relative)
    {
        headers.insert(header::LOCATION, value);
    }

    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Path-relative form of an absolute `location` on the upstream origin.
pub fn relative_location(location: &str, upstream: &Url) -> Option<String> {
    let target = Url::parse(location).ok()?;
    if target.origin() != upstream.origin() {
        return None;
    }

    let mut relative = target.path().to_string();
    if let Some(query) = target.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = target.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    Some(relative)
}

/// Application-level error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Request cannot be mapped onto the upstream (400)
    BadRequest(String),
    /// Passthrough request failed (502)
    Upstream(FetchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(err) => {
                tracing::warn!("Upstream request failed: {err}");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        };

        (status, message).into_response()
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        Self::Upstream(err)
    }
}
