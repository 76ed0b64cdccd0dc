//! Rewritten playlist and guide endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::Response,
};

use super::request_host;
use crate::errors::AppResult;
use crate::web::{AppState, responses};

const M3U_CONTENT_TYPE: &str = "application/x-mpegurl";
const XMLTV_CONTENT_TYPE: &str = "application/xml";

/// `GET /{source}/playlist.m3u`
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> AppResult<Response> {
    let host = request_host(&headers, &uri);
    let document = state.playlist_service.playlist(&source, &host).await?;
    Ok(responses::document(document, M3U_CONTENT_TYPE))
}

/// `GET /{source}/epg.xml`
pub async fn get_epg(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> AppResult<Response> {
    let host = request_host(&headers, &uri);
    let document = state.playlist_service.epg(&source, &host).await?;
    Ok(responses::document(document, XMLTV_CONTENT_TYPE))
}
