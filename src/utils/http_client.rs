use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult, SourceError};
use crate::utils::url::UrlUtils;
use crate::utils::{CompressionFormat, DecompressionService};

/// Retrieves upstream playlists and guides
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// Fetch URL and return decompressed text content
    ///
    /// Single attempt, no retry. A non-success status is a
    /// [`SourceError::Http`]; a connection failure is an
    /// [`AppError::ExternalService`].
    async fn fetch_text(&self, url: &str) -> AppResult<String>;
}

/// reqwest-backed [`UpstreamFetcher`]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    /// Client for whole-document fetches, bounded by the total request timeout
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Client for media pass-through, with a connection timeout only so long
    /// transfers are not cut off
    pub fn streaming_client(config: &UpstreamConfig) -> AppResult<Client> {
        Ok(Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?)
    }

    /// Process response with automatic decompression
    async fn process_response_to_bytes(response: Response, url: &str) -> AppResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            debug!(
                "Upstream {} answered {}",
                UrlUtils::obfuscate_credentials(url),
                status
            );
            return Err(SourceError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
            )
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| {
            AppError::external_service(
                "upstream",
                UrlUtils::obfuscate_credentials(&format!("Failed to read response: {e}")),
            )
        })?;

        debug!("Fetched {} bytes of raw content", bytes.len());

        let compression_format = DecompressionService::detect_compression_format(&bytes);
        let decompressed = match compression_format {
            CompressionFormat::Uncompressed => bytes.to_vec(),
            _ => DecompressionService::decompress(bytes)?,
        };

        debug!(
            "Processed {} bytes of content (compression: {:?})",
            decompressed.len(),
            compression_format
        );

        Ok(decompressed)
    }
}

#[async_trait]
impl UpstreamFetcher for StandardHttpClient {
    async fn fetch_text(&self, url: &str) -> AppResult<String> {
        debug!(
            "Fetching text content from: {}",
            UrlUtils::obfuscate_credentials(url)
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                SourceError::Timeout {
                    url: UrlUtils::obfuscate_credentials(url),
                }
                .to_string()
            } else {
                UrlUtils::obfuscate_credentials(&e.to_string())
            };
            AppError::external_service("upstream", message)
        })?;

        let bytes = Self::process_response_to_bytes(response, url).await?;

        // Stray invalid bytes in an otherwise usable playlist should not fail the request
        let content = String::from_utf8_lossy(&bytes).into_owned();

        debug!("Fetched {} characters of text content", content.len());
        Ok(content)
    }
}
