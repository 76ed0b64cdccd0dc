//! Fetch-or-reuse plus rewrite for both document types
//!
//! The rewrite is redone on every request, cache hit or not, because its
//! output depends on the host the client used to reach the proxy.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigStore, ProxyConfig, SourceConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{CacheStatus, ChannelMapping, RewrittenDocument};
use crate::proxy::{rewrite_epg, rewrite_m3u};
use crate::services::source_cache::SourceCache;
use crate::utils::{UpstreamFetcher, UrlUtils};

#[derive(Clone)]
pub struct PlaylistService {
    config_store: Arc<dyn ConfigStore>,
    fetcher: Arc<dyn UpstreamFetcher>,
    cache: Arc<SourceCache>,
}

impl PlaylistService {
    pub fn new(
        config_store: Arc<dyn ConfigStore>,
        fetcher: Arc<dyn UpstreamFetcher>,
        cache: Arc<SourceCache>,
    ) -> Self {
        Self {
            config_store,
            fetcher,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    /// Rewritten playlist for `source_name` as seen from `request_host`
    pub async fn playlist(
        &self,
        source_name: &str,
        request_host: &str,
    ) -> AppResult<RewrittenDocument> {
        let config = self.config_store.snapshot().await?;
        let source = Self::resolve_source(&config, source_name)?;

        let lookup = self
            .cache
            .m3u
            .get_or_fetch(&source.name, config.cache_duration, || {
                self.fetch_upstream(&source.m3u_url)
            })
            .await?;

        let result = rewrite_m3u(&lookup.content, &config, source, request_host);
        self.cache
            .m3u
            .set_derived(&source.name, Arc::new(result.channel_mapping))
            .await;

        Ok(RewrittenDocument {
            body: result.content,
            cache_status: lookup.status,
        })
    }

    /// Rewritten guide for `source_name`, synced with the latest playlist rewrite
    pub async fn epg(&self, source_name: &str, request_host: &str) -> AppResult<RewrittenDocument> {
        let config = self.config_store.snapshot().await?;
        let source = Self::resolve_source(&config, source_name)?;
        let epg_url = source
            .epg_url
            .as_deref()
            .ok_or_else(|| AppError::not_found("EPG configuration", &source.name))?;

        let mapping = match self.cache.channel_mapping(&source.name).await {
            Some(mapping) => mapping,
            None => {
                debug!(
                    "Playlist for source '{}' not requested yet, guide channel ids are not synced",
                    source.name
                );
                Arc::new(ChannelMapping::new())
            }
        };

        let lookup = self
            .cache
            .epg
            .get_or_fetch(&source.name, config.cache_duration, || {
                self.fetch_upstream(epg_url)
            })
            .await?;

        let body = rewrite_epg(&lookup.content, &config, request_host, &mapping);

        Ok(RewrittenDocument {
            body,
            cache_status: lookup.status,
        })
    }

    fn resolve_source<'a>(config: &'a ProxyConfig, source_name: &str) -> AppResult<&'a SourceConfig> {
        config
            .find_source(source_name)
            .ok_or_else(|| AppError::not_found("Source", source_name))
    }

    async fn fetch_upstream(&self, url: &str) -> AppResult<String> {
        let content = self.fetcher.fetch_text(url).await?;
        info!(
            "Fetched {} bytes from {}",
            content.len(),
            UrlUtils::obfuscate_credentials(url)
        );
        Ok(content)
    }
}
