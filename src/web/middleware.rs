//! HTTP middleware

use axum::{
    extract::Request,
    http::{Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

use super::responses::X_CACHE;
use crate::utils::UrlUtils;

/// Request path safe to log; stream targets often carry upstream credentials
fn loggable_path(uri: &Uri) -> String {
    let path = uri.path();
    match urlencoding::decode(path) {
        Ok(decoded) => UrlUtils::obfuscate_credentials(&decoded),
        Err(_) => path.to_string(),
    }
}

/// Request logging middleware
///
/// Logs all incoming requests with timing information and, for documents
/// served from the source cache, whether the cache was hit.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = loggable_path(&uri);
    let request_id = uuid::Uuid::new_v4().to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();
    let cache = response
        .headers()
        .get(X_CACHE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    if status >= 400 {
        warn!(
            method = %method,
            path = %path,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status = status,
            cache = cache,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}
