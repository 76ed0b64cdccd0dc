use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_proxy::{
    config::{Config, FileConfigStore},
    services::{PlaylistService, SourceCache},
    utils::{StandardHttpClient, UrlUtils},
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "playlist-proxy")]
#[command(version)]
#[command(about = "Reverse proxy for IPTV playlists and guides with channel renumbering")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    let log_filter = if log_level == "trace" {
        format!("playlist_proxy={log_level},tower_http=trace")
    } else {
        format!("playlist_proxy={log_level}")
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting playlist-proxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    info!("Configuration loaded from: {}", cli.config);

    // Listener overrides only; per-request settings always come from the file
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.web.host, config.web.port
            )
        })?;

    log_sources(&config);

    let fetcher = StandardHttpClient::new(&config.upstream)?;
    let stream_client = StandardHttpClient::streaming_client(&config.upstream)?;
    let playlist_service = PlaylistService::new(
        Arc::new(FileConfigStore::new(&cli.config, config.web.port)),
        Arc::new(fetcher),
        Arc::new(SourceCache::new()),
    );

    let server = WebServer::new(
        addr,
        AppState {
            playlist_service,
            stream_client,
        },
    );
    info!("Web server starting on {}:{}", server.host(), server.port());

    server.serve().await?;
    info!("Server stopped");
    Ok(())
}

fn log_sources(config: &Config) {
    info!(
        "Stream proxying {}, cache duration {}",
        if config.proxy.proxy_streams {
            "enabled"
        } else {
            "disabled"
        },
        humantime::format_duration(config.proxy.cache_duration)
    );

    if config.sources.is_empty() {
        info!("No sources configured yet, add a [[sources]] table to the config file");
    }

    for source in &config.sources {
        info!(
            "Source '{}': /{}/playlist.m3u <- {}",
            source.name,
            source.name,
            UrlUtils::obfuscate_credentials(&source.m3u_url)
        );
        match &source.epg_url {
            Some(epg_url) => info!(
                "Source '{}': /{}/epg.xml <- {}",
                source.name,
                source.name,
                UrlUtils::obfuscate_credentials(epg_url)
            ),
            None => info!("Source '{}': EPG not configured", source.name),
        }
    }
}
