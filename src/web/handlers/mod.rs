//! HTTP request handlers
//!
//! Handlers stay thin: they pull what they need out of the request and
//! delegate to [`crate::services::PlaylistService`].

use axum::http::{HeaderMap, Uri, header};
use axum::response::Response;

use super::responses;

pub mod health;
pub mod playlist;
pub mod stream;

/// Host the client used to reach us, port included
///
/// The `Host` header wins, then the request URI authority.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Fallback for unknown paths
pub async fn not_found() -> Response {
    responses::not_found()
}
