use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;
pub mod store;

use crate::errors::{AppError, AppResult};
use crate::utils::url::UrlUtils;
use defaults::*;

pub use store::{ConfigStore, FileConfigStore, StaticConfigStore};

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Global settings that shape every rewritten document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Hostname used in rewritten URLs instead of the request's Host header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
    /// Route stream and logo URLs through `/stream/`
    #[serde(default = "default_proxy_streams")]
    pub proxy_streams: bool,
    /// Upstream cache TTL, zero disables cache hits
    #[serde(default = "default_cache_duration", with = "duration_serde::duration")]
    pub cache_duration: Duration,
    /// Fallback renumbering for sources that do not set their own
    #[serde(default)]
    pub channel_renumber: RenumberMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One upstream playlist/guide pair, addressed as `/{name}/...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub m3u_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epg_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_renumber: Option<RenumberMode>,
    /// Overwrite tvg-id/channel-id with the new channel number
    #[serde(default)]
    pub sync_channel_ids: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

/// How channel numbers are reassigned while rewriting a playlist
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenumberMode {
    /// Keep upstream numbers
    #[default]
    None,
    /// Number channels sequentially by position, starting at `start_from`
    StartingIndex { start_from: f64 },
    /// Shift every numeric channel number by `add_value`
    Addition { add_value: f64 },
}

impl RenumberMode {
    pub fn is_none(&self) -> bool {
        matches!(self, RenumberMode::None)
    }
}

/// Immutable view of the configuration used to serve one request
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub hostname_override: Option<String>,
    /// Port appended to `hostname_override` in proxy URLs
    pub port: u16,
    pub protocol: Protocol,
    pub proxy_streams_enabled: bool,
    pub cache_duration: Duration,
    pub channel_renumber: RenumberMode,
    pub sources: Vec<SourceConfig>,
}

impl ProxyConfig {
    pub fn find_source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.name == name)
    }

    /// Source mode if set, else the global mode
    pub fn effective_renumber(&self, source: &SourceConfig) -> RenumberMode {
        source.channel_renumber.unwrap_or(self.channel_renumber)
    }

    /// Base URL under which this proxy is reachable for the given request host
    ///
    /// The request host already carries its own port, so the configured port is
    /// only appended when a hostname override is in effect.
    pub fn proxy_base_url(&self, request_host: &str) -> String {
        match &self.hostname_override {
            Some(hostname) => format!("{}://{}:{}", self.protocol, hostname, self.port),
            None => format!("{}://{}", self.protocol, request_host),
        }
    }
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Proxy defaults
fn default_proxy_streams() -> bool {
    DEFAULT_PROXY_STREAMS
}

fn default_cache_duration() -> Duration {
    Duration::from_secs(DEFAULT_CACHE_DURATION_SECS)
}

// Upstream defaults
fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            hostname: None,
            protocol: Protocol::default(),
            proxy_streams: default_proxy_streams(),
            cache_duration: default_cache_duration(),
            channel_renumber: RenumberMode::None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            proxy: ProxySettings::default(),
            upstream: UpstreamConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::configuration(format!("Invalid configuration file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read an existing configuration file
    pub fn read_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Read the configuration file, writing a default one first if it is missing
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::read_from_file(path)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config).map_err(|e| {
                AppError::configuration(format!("Failed to render default config: {e}"))
            })?;
            std::fs::write(path, contents).map_err(|e| {
                AppError::configuration(format!("Failed to write {}: {e}", path.display()))
            })?;
            info!("Created default config file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(hostname) = &self.proxy.hostname
            && hostname.trim().is_empty()
        {
            return Err(AppError::configuration("proxy.hostname must not be blank"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() {
                return Err(AppError::configuration("Source name must not be empty"));
            }
            if !source
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(AppError::configuration(format!(
                    "Source name '{}' must only contain letters, digits, '-', '_' or '.'",
                    source.name
                )));
            }
            if source.name == "stream" || source.name == "health" {
                return Err(AppError::configuration(format!(
                    "Source name '{}' is reserved",
                    source.name
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            if !UrlUtils::is_http_url(&source.m3u_url) {
                return Err(AppError::configuration(format!(
                    "Source '{}' has an invalid m3u_url",
                    source.name
                )));
            }
            if let Some(epg_url) = &source.epg_url
                && !UrlUtils::is_http_url(epg_url)
            {
                return Err(AppError::configuration(format!(
                    "Source '{}' has an invalid epg_url",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Snapshot used to serve a single request
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            hostname_override: self.proxy.hostname.clone(),
            port: self.web.port,
            protocol: self.proxy.protocol,
            proxy_streams_enabled: self.proxy.proxy_streams,
            cache_duration: self.proxy.cache_duration,
            channel_renumber: self.proxy.channel_renumber,
            sources: self.sources.clone(),
        }
    }
}
