//! Per-source cache of raw upstream documents
//!
//! Entries always hold upstream bytes, never rewritten output, because the
//! rewrite depends on the host of each request. Staleness is checked lazily
//! on access and nothing is evicted in the background.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::errors::AppResult;
use crate::models::{CacheStatus, ChannelMapping};

/// Raw upstream document plus whatever was derived from it
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub raw_content: Arc<str>,
    pub fetched_at: Instant,
    pub derived: T,
}

impl<T> CacheEntry<T> {
    /// Fresh entries are younger than `ttl`; a zero ttl is never fresh
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        !ttl.is_zero() && self.fetched_at.elapsed() < ttl
    }
}

/// Result of [`CacheSpace::get_or_fetch`]
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub content: Arc<str>,
    pub status: CacheStatus,
}

/// One independent key space, keyed by source name
pub struct CacheSpace<T> {
    name: &'static str,
    entries: RwLock<HashMap<String, Arc<CacheEntry<T>>>>,
}

impl<T: Clone + Default> CacheSpace<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stored raw content if still fresh, otherwise `fetch` and store the result
    ///
    /// A failed fetch leaves any existing entry in place. A replacement entry
    /// keeps the previous derived value until [`CacheSpace::set_derived`] is
    /// called for it.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> AppResult<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<String>>,
    {
        if let Some(entry) = self.entries.read().await.get(key)
            && entry.is_fresh(ttl)
        {
            debug!("{} cache hit for source '{}'", self.name, key);
            return Ok(CacheLookup {
                content: entry.raw_content.clone(),
                status: CacheStatus::Hit,
            });
        }

        debug!("{} cache miss for source '{}'", self.name, key);
        let content: Arc<str> = Arc::from(fetch().await?);

        let mut entries = self.entries.write().await;
        let derived = entries
            .get(key)
            .map(|previous| previous.derived.clone())
            .unwrap_or_default();
        entries.insert(
            key.to_string(),
            Arc::new(CacheEntry {
                raw_content: content.clone(),
                fetched_at: Instant::now(),
                derived,
            }),
        );

        Ok(CacheLookup {
            content,
            status: CacheStatus::Miss,
        })
    }

    /// Replace the derived value of an existing entry without refreshing it
    pub async fn set_derived(&self, key: &str, derived: T) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            *entry = Arc::new(CacheEntry {
                raw_content: entry.raw_content.clone(),
                fetched_at: entry.fetched_at,
                derived,
            });
        }
    }

    /// Derived value of the entry for `key`, regardless of its age
    pub async fn derived(&self, key: &str) -> Option<T> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.derived.clone())
    }

    pub async fn entry(&self, key: &str) -> Option<Arc<CacheEntry<T>>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Both cache spaces, shared by the playlist and guide handlers
pub struct SourceCache {
    pub m3u: CacheSpace<Arc<ChannelMapping>>,
    pub epg: CacheSpace<()>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self {
            m3u: CacheSpace::new("M3U"),
            epg: CacheSpace::new("EPG"),
        }
    }

    /// Mapping from the latest playlist rewrite for `source_name`, if any
    pub async fn channel_mapping(&self, source_name: &str) -> Option<Arc<ChannelMapping>> {
        self.m3u.derived(source_name).await
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new()
    }
}
