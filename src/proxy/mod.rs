//! Playlist and guide rewriting
//!
//! Both rewriters work on raw text with targeted pattern substitutions rather
//! than a full parser, so malformed upstream documents still come through with
//! whatever could be rewritten.

use tracing::trace;
use url::Url;

use crate::config::ProxyConfig;

pub mod epg_rewriter;
pub mod m3u_rewriter;
pub mod renumber;

pub use epg_rewriter::rewrite_epg;
pub use m3u_rewriter::rewrite_m3u;
pub use renumber::renumber;

/// Turns upstream media URLs into `/stream/` URLs on this proxy
#[derive(Debug, Clone)]
pub struct StreamUrlRewriter {
    stream_prefix: String,
    enabled: bool,
}

impl StreamUrlRewriter {
    pub fn new(proxy_base_url: &str, enabled: bool) -> Self {
        Self {
            stream_prefix: format!("{}/stream/", proxy_base_url.trim_end_matches('/')),
            enabled,
        }
    }

    pub fn for_request(config: &ProxyConfig, request_host: &str) -> Self {
        Self::new(
            &config.proxy_base_url(request_host),
            config.proxy_streams_enabled,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Proxied form of `original`, or `None` when it should be emitted unchanged
    ///
    /// URLs already pointing at this proxy's stream endpoint are not wrapped a
    /// second time. Anything that does not parse as an absolute http(s) URL is
    /// left alone.
    pub fn rewrite(&self, original: &str) -> Option<String> {
        if !self.enabled || original.starts_with(&self.stream_prefix) {
            return None;
        }

        match Url::parse(original) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
                Some(format!(
                    "{}{}",
                    self.stream_prefix,
                    urlencoding::encode(original)
                ))
            }
            Ok(_) => None,
            Err(e) => {
                trace!("Leaving malformed URL untouched: {}", e);
                None
            }
        }
    }
}
