//! Web layer module
//!
//! Routes:
//! - `GET /{source}/playlist.m3u` rewritten playlist
//! - `GET /{source}/epg.xml` rewritten guide
//! - `GET /stream/{*url}` media pass-through
//! - `GET /health` liveness and cache summary

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::services::PlaylistService;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::handle_error;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub playlist_service: PlaylistService,
    /// Client used for media pass-through, without a total request timeout
    pub stream_client: reqwest::Client,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/stream/", get(handlers::stream::proxy_stream_without_target))
        .route("/stream/{*url}", get(handlers::stream::proxy_stream))
        .route("/{source}/playlist.m3u", get(handlers::playlist::get_playlist))
        .route("/{source}/epg.xml", get(handlers::playlist::get_epg))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(
            middleware::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            app: create_router(state),
            addr,
        }
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            tracing::warn!("Failed to install signal handlers, graceful shutdown disabled");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully");
        } else {
            std::future::pending::<()>().await;
        }
    }
}
