//! Access to the current configuration snapshot
//!
//! Handlers never hold on to a configuration between requests; they ask the
//! store for a fresh [`ProxyConfig`] each time.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Config, ProxyConfig, SourceConfig};
use crate::errors::{AppError, AppResult};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current configuration snapshot
    async fn snapshot(&self) -> AppResult<Arc<ProxyConfig>>;

    /// Look up a single source by its routing name
    async fn find_source(&self, name: &str) -> AppResult<Option<SourceConfig>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.find_source(name).cloned())
    }
}

/// Re-reads the configuration file on every call so edits apply without a restart
pub struct FileConfigStore {
    path: PathBuf,
    port: u16,
}

impl FileConfigStore {
    /// `port` is the port the server actually listens on, which may differ from
    /// the file when overridden on the command line
    pub fn new(path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            path: path.into(),
            port,
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn snapshot(&self) -> AppResult<Arc<ProxyConfig>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::configuration(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let config = Config::from_toml_str(&contents)?;
        debug!(
            "Loaded configuration from {} ({} sources)",
            self.path.display(),
            config.sources.len()
        );

        let mut snapshot = config.proxy_config();
        snapshot.port = self.port;
        Ok(Arc::new(snapshot))
    }
}

/// Serves a fixed snapshot
#[derive(Clone)]
pub struct StaticConfigStore {
    config: Arc<ProxyConfig>,
}

impl StaticConfigStore {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn snapshot(&self) -> AppResult<Arc<ProxyConfig>> {
        Ok(self.config.clone())
    }
}
