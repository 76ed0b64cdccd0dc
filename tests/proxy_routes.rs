//! HTTP-level behaviour of the proxy routes
//!
//! Upstream documents come from an in-memory fetcher that counts calls, so
//! each test can assert exactly when the proxy went upstream.

use async_trait::async_trait;
use axum::{
    Router,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_test::TestServer;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use playlist_proxy::{
    config::{Config, StaticConfigStore},
    errors::{AppError, AppResult, SourceError},
    services::{PlaylistService, SourceCache},
    web::{AppState, create_router},
};

const M3U_URL: &str = "http://upstream.test/playlist.m3u";
const EPG_URL: &str = "http://upstream.test/epg.xml";

const PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"CNN.US\" tvg-chno=\"5\" tvg-logo=\"http://logos.test/cnn.png\",CNN\n\
http://cdn.test/live/cnn.ts\n\
#EXTINF:-1 tvg-id=\"BBC.UK\" tvg-chno=\"7\",BBC One\n\
http://cdn.test/live/bbc.ts\n";

const GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="CNN.US"><display-name>CNN</display-name><icon src="http://logos.test/cnn.png"/><lcn>5</lcn></channel>
  <channel id="BBC.UK"><display-name>BBC One</display-name><lcn>7</lcn></channel>
  <programme start="20240101060000 +0000" stop="20240101070000 +0000" channel="CNN.US"><title>Morning</title></programme>
  <programme start="20240101060000 +0000" stop="20240101070000 +0000" channel="BBC.UK"><title>Breakfast</title></programme>
</tv>"#;

enum Canned {
    Body(String),
    Status(u16),
}

/// In-memory upstream that counts every fetch
#[derive(Default)]
struct CountingFetcher {
    responses: Mutex<HashMap<String, Canned>>,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn with_documents() -> Arc<Self> {
        let fetcher = Arc::new(Self::default());
        fetcher.serve(M3U_URL, PLAYLIST);
        fetcher.serve(EPG_URL, GUIDE);
        fetcher
    }

    fn serve(&self, url: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Body(body.to_string()));
    }

    fn fail_with(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Status(status));
    }

    fn disconnect(&self, url: &str) {
        self.responses.lock().unwrap().remove(url);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl playlist_proxy::utils::UpstreamFetcher for CountingFetcher {
    async fn fetch_text(&self, url: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().get(url) {
            Some(Canned::Body(body)) => Ok(body.clone()),
            Some(Canned::Status(status)) => {
                Err(SourceError::http_status(*status, "canned failure").into())
            }
            None => Err(AppError::external_service("upstream", "connection refused")),
        }
    }
}

struct Harness {
    server: TestServer,
    fetcher: Arc<CountingFetcher>,
    cache: Arc<SourceCache>,
}

fn config_toml(proxy_streams: bool, cache_duration: u64) -> String {
    format!(
        r#"
[web]
port = 3000

[proxy]
proxy_streams = {proxy_streams}
cache_duration = {cache_duration}

[[sources]]
name = "main"
m3u_url = "{M3U_URL}"
epg_url = "{EPG_URL}"
channel_renumber = {{ type = "starting-index", start_from = 100 }}

[[sources]]
name = "plain"
m3u_url = "{M3U_URL}"
"#
    )
}

fn harness_with(toml: &str, fetcher: Arc<CountingFetcher>) -> Harness {
    let config = Config::from_toml_str(toml).unwrap();
    let cache = Arc::new(SourceCache::new());
    let state = AppState {
        playlist_service: PlaylistService::new(
            Arc::new(StaticConfigStore::new(config.proxy_config())),
            fetcher.clone(),
            cache.clone(),
        ),
        stream_client: reqwest::Client::new(),
    };

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        fetcher,
        cache,
    }
}

fn harness(proxy_streams: bool, cache_duration: u64) -> Harness {
    harness_with(
        &config_toml(proxy_streams, cache_duration),
        CountingFetcher::with_documents(),
    )
}

#[tokio::test]
async fn test_unknown_source_returns_404_without_fetching() {
    let h = harness(false, 300);

    let playlist = h.server.get("/missing/playlist.m3u").await;
    playlist.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(playlist.text(), "Source not found: missing");

    let guide = h.server.get("/missing/epg.xml").await;
    guide.assert_status(StatusCode::NOT_FOUND);

    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_epg_without_configured_url_returns_404() {
    let h = harness(false, 300);

    let response = h.server.get("/plain/epg.xml").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_playlist_miss_then_hit() {
    let h = harness(false, 300);

    let first = h.server.get("/main/playlist.m3u").await;
    first.assert_status_ok();
    assert_eq!(first.header("x-cache"), "MISS");
    assert_eq!(first.header("content-type"), "application/x-mpegurl");
    assert!(first.text().contains("tvg-chno=\"100\""));
    assert!(first.text().contains("tvg-chno=\"101\""));

    let second = h.server.get("/main/playlist.m3u").await;
    assert_eq!(second.header("x-cache"), "HIT");
    assert_eq!(second.text(), first.text());
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_expires_after_ttl() {
    let h = harness(false, 60);

    assert_eq!(h.server.get("/main/playlist.m3u").await.header("x-cache"), "MISS");

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(h.server.get("/main/playlist.m3u").await.header("x-cache"), "HIT");
    assert_eq!(h.fetcher.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(h.server.get("/main/playlist.m3u").await.header("x-cache"), "MISS");
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_zero_cache_duration_always_fetches() {
    let h = harness(false, 0);

    for _ in 0..3 {
        let response = h.server.get("/main/playlist.m3u").await;
        assert_eq!(response.header("x-cache"), "MISS");
    }
    assert_eq!(h.fetcher.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_upstream_500_returns_502_and_keeps_cache() {
    let h = harness(false, 60);

    h.server.get("/main/playlist.m3u").await.assert_status_ok();
    let cached = h.cache.m3u.entry("main").await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    h.fetcher.fail_with(M3U_URL, 500);

    let response = h.server.get("/main/playlist.m3u").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.text(), "Upstream error: 500");

    let after = h.cache.m3u.entry("main").await.unwrap();
    assert!(Arc::ptr_eq(&cached, &after));
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_network_failure_returns_502() {
    let h = harness(false, 300);
    h.fetcher.disconnect(EPG_URL);

    let response = h.server.get("/main/epg.xml").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.text(), "Failed to fetch upstream");
    assert!(h.cache.epg.is_empty().await);
}

#[tokio::test]
async fn test_epg_synced_after_playlist_request() {
    let h = harness(false, 300);

    let before = h.server.get("/main/epg.xml").await;
    before.assert_status_ok();
    assert_eq!(before.header("content-type"), "application/xml");
    assert!(before.text().contains(r#"<channel id="CNN.US">"#));

    h.server.get("/main/playlist.m3u").await.assert_status_ok();

    let after = h.server.get("/main/epg.xml").await;
    assert_eq!(after.header("x-cache"), "HIT");
    let body = after.text();
    assert!(body.contains(r#"<channel id="100"><display-name>CNN</display-name>"#));
    assert!(body.contains("<lcn>100</lcn>"));
    assert!(body.contains(r#"<channel id="101">"#));
    assert!(body.contains("<lcn>101</lcn>"));
    assert!(body.contains(r#"stop="20240101070000 +0000" channel="100">"#));
    assert!(body.contains(r#"stop="20240101070000 +0000" channel="101">"#));
    assert!(!body.contains("CNN.US"));
}

#[tokio::test]
async fn test_proxied_urls_follow_request_host() {
    let h = harness(true, 300);

    let first = h
        .server
        .get("/main/playlist.m3u")
        .add_header(header::HOST, HeaderValue::from_static("tv.lan:3000"))
        .await;
    assert!(first.text().contains(
        "\nhttp://tv.lan:3000/stream/http%3A%2F%2Fcdn.test%2Flive%2Fcnn.ts\n"
    ));
    assert!(first.text().contains(
        "tvg-logo=\"http://tv.lan:3000/stream/http%3A%2F%2Flogos.test%2Fcnn.png\""
    ));

    // Cached upstream, rewritten again for a different host
    let second = h
        .server
        .get("/main/playlist.m3u")
        .add_header(header::HOST, HeaderValue::from_static("192.168.1.20:3000"))
        .await;
    assert_eq!(second.header("x-cache"), "HIT");
    assert!(second.text().contains("http://192.168.1.20:3000/stream/"));
    assert!(!second.text().contains("tv.lan"));

    let guide = h
        .server
        .get("/main/epg.xml")
        .add_header(header::HOST, HeaderValue::from_static("tv.lan:3000"))
        .await;
    assert!(guide.text().contains(
        r#"<icon src="http://tv.lan:3000/stream/http%3A%2F%2Flogos.test%2Fcnn.png"/>"#
    ));
}

#[tokio::test]
async fn test_hostname_override_ignores_request_host() {
    let toml = config_toml(true, 300).replace(
        "[proxy]\n",
        "[proxy]\nhostname = \"iptv.example.net\"\nprotocol = \"https\"\n",
    );
    let h = harness_with(&toml, CountingFetcher::with_documents());

    let response = h
        .server
        .get("/main/playlist.m3u")
        .add_header(header::HOST, HeaderValue::from_static("tv.lan:3000"))
        .await;
    assert!(
        response
            .text()
            .contains("https://iptv.example.net:3000/stream/http%3A%2F%2Fcdn.test%2Flive%2Fcnn.ts")
    );
}

#[tokio::test]
async fn test_health_reports_sources_and_cache() {
    let h = harness(false, 300);
    h.server.get("/main/playlist.m3u").await.assert_status_ok();

    let response = h.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sources"], 2);
    assert_eq!(body["cache"]["m3u"], 1);
    assert_eq!(body["cache"]["epg"], 0);
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let h = harness(false, 300);
    let response = h.server.get("/main/other.txt").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Not Found");
}

#[tokio::test]
async fn test_stream_forbidden_when_disabled() {
    let h = harness(false, 300);
    let target = urlencoding::encode("http://cdn.test/live/cnn.ts");

    let response = h.server.get(&format!("/stream/{target}")).await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_stream_rejects_invalid_targets() {
    let h = harness(true, 300);

    h.server
        .get("/stream/not-a-url")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get("/stream/")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get(&format!("/stream/{}", urlencoding::encode("ftp://cdn.test/a.ts")))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

async fn echo_agent(headers: HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn video(headers: HeaderMap) -> Response {
    match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some("bytes=0-3") => (
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, "video/mp2t".to_string()),
                (header::CONTENT_RANGE, "bytes 0-3/10".to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            "0123",
        )
            .into_response(),
        _ => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp2t".to_string()),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            "0123456789",
        )
            .into_response(),
    }
}

async fn spawn_media_upstream() -> String {
    let app = Router::new()
        .route("/video.ts", get(video))
        .route("/agent", get(echo_agent))
        .route("/gone.ts", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_stream_relays_body_and_headers() {
    let upstream = spawn_media_upstream().await;
    let h = harness(true, 300);
    let target = urlencoding::encode(&format!("{upstream}/video.ts")).into_owned();

    let full = h.server.get(&format!("/stream/{target}")).await;
    full.assert_status_ok();
    assert_eq!(full.text(), "0123456789");
    assert_eq!(full.header("content-type"), "video/mp2t");
    assert_eq!(full.header("cache-control"), "no-cache");
    assert_eq!(full.header("x-proxied-from"), "127.0.0.1");

    let partial = h
        .server
        .get(&format!("/stream/{target}"))
        .add_header(header::RANGE, HeaderValue::from_static("bytes=0-3"))
        .await;
    partial.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(partial.text(), "0123");
    assert_eq!(partial.header("content-range"), "bytes 0-3/10");
    assert_eq!(partial.header("accept-ranges"), "bytes");
}

#[tokio::test]
async fn test_stream_forwards_user_agent() {
    let upstream = spawn_media_upstream().await;
    let h = harness(true, 300);
    let target = urlencoding::encode(&format!("{upstream}/agent")).into_owned();

    let response = h
        .server
        .get(&format!("/stream/{target}"))
        .add_header(header::USER_AGENT, HeaderValue::from_static("TestPlayer/1.0"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "TestPlayer/1.0");
}

#[tokio::test]
async fn test_stream_relays_upstream_status() {
    let upstream = spawn_media_upstream().await;
    let h = harness(true, 300);
    let target = urlencoding::encode(&format!("{upstream}/gone.ts")).into_owned();

    h.server
        .get(&format!("/stream/{target}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_connection_failure_returns_502() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let h = harness(true, 300);
    let target = urlencoding::encode(&format!("http://{addr}/video.ts")).into_owned();

    h.server
        .get(&format!("/stream/{target}"))
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
