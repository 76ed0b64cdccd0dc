//! Health check endpoint

use axum::{Json, extract::State};
use serde::Serialize;

use crate::errors::AppResult;
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: usize,
    pub cache: CacheStats,
}

/// Number of sources with a cached upstream document, per document type
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub m3u: usize,
    pub epg: usize,
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let config = state.playlist_service.config_store().snapshot().await?;
    let cache = state.playlist_service.cache();

    Ok(Json(HealthResponse {
        status: "ok",
        sources: config.sources.len(),
        cache: CacheStats {
            m3u: cache.m3u.len().await,
            epg: cache.epg.len().await,
        },
    }))
}
