//! Media pass-through
//!
//! Bytes are relayed as they arrive; nothing is buffered or transformed.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, Uri, header},
    response::Response,
};
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::utils::UrlUtils;
use crate::web::AppState;

/// Client request headers passed on to the upstream
const FORWARDED_REQUEST_HEADERS: [HeaderName; 2] = [header::USER_AGENT, header::RANGE];

/// Upstream response headers relayed back to the client
const RELAYED_RESPONSE_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CACHE_CONTROL,
];

const X_PROXIED_FROM: &str = "x-proxied-from";

/// `GET /stream/{*url}`
///
/// The wildcard is percent-decoded by the router. A raw, unencoded target
/// loses its query string to the outer request, so that is appended back.
pub async fn proxy_stream(
    State(state): State<AppState>,
    Path(target): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    relay(state, target, &uri, &headers).await
}

/// `GET /stream/` with nothing to stream
pub async fn proxy_stream_without_target(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Response> {
    relay(state, String::new(), &uri, &headers).await
}

async fn relay(
    state: AppState,
    target: String,
    uri: &Uri,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let config = state.playlist_service.config_store().snapshot().await?;
    if !config.proxy_streams_enabled {
        return Err(AppError::permission_denied(
            "Stream proxying",
            "this server",
        ));
    }

    if target.trim().is_empty() {
        return Err(AppError::validation("Missing stream URL"));
    }
    let target = match uri.query() {
        Some(query) if !target.contains('?') => format!("{target}?{query}"),
        _ => target,
    };
    let target_url = UrlUtils::parse_http_url(&target)
        .ok_or_else(|| AppError::validation("Invalid stream URL"))?;

    let mut request = state
        .stream_client
        .get(target_url.clone())
        .header(
            header::ACCEPT,
            headers
                .get(header::ACCEPT)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("*/*")),
        );
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }

    debug!(
        "Proxying stream from {}",
        UrlUtils::obfuscate_credentials(target_url.as_str())
    );
    let upstream = request.send().await.map_err(|e| {
        AppError::external_service("stream", UrlUtils::obfuscate_credentials(&e.to_string()))
    })?;

    let mut response = Response::builder().status(upstream.status());
    for name in RELAYED_RESPONSE_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response = response.header(name, value.clone());
        }
    }
    if let Some(host) = UrlUtils::extract_domain(target_url.as_str()) {
        response = response.header(X_PROXIED_FROM, host);
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::internal(format!("Failed to build stream response: {e}")))
}
