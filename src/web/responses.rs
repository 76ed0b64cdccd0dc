//! HTTP response mapping
//!
//! Every error leaves as a short plain-text body. Internal details are logged,
//! never sent to the client.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::errors::{AppError, SourceError};
use crate::models::RewrittenDocument;

pub const X_CACHE: &str = "x-cache";

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::NotFound { resource, id } => {
            (StatusCode::NOT_FOUND, format!("{resource} not found: {id}"))
        }
        AppError::PermissionDenied { action, resource } => (
            StatusCode::FORBIDDEN,
            format!("{action} is disabled for {resource}"),
        ),
        AppError::Source(SourceError::Http { status, .. }) => {
            (StatusCode::BAD_GATEWAY, format!("Upstream error: {status}"))
        }
        AppError::Source(_) | AppError::ExternalService { .. } | AppError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "Failed to fetch upstream".to_string())
        }
        AppError::Configuration { .. } | AppError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
    };

    if status.is_server_error() {
        error!("Request failed with {}: {}", status.as_u16(), error);
    } else {
        warn!("Request rejected with {}: {}", status.as_u16(), error);
    }

    plain_text(status, message)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

/// 200 with the document body, its content type and an `X-Cache` header
pub fn document(document: RewrittenDocument, content_type: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (
                header::HeaderName::from_static(X_CACHE),
                HeaderValue::from_static(document.cache_status.as_header_value()),
            ),
        ],
        document.body,
    )
        .into_response()
}

pub fn not_found() -> Response {
    plain_text(StatusCode::NOT_FOUND, "Not Found")
}
