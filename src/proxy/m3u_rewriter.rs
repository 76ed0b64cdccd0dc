//! M3U playlist rewriting
//!
//! A single pass over the playlist lines. `#EXTINF` lines get their channel
//! number (and optionally their identifiers) rewritten and contribute to the
//! [`ChannelMapping`]; bare stream URL lines are routed through the proxy when
//! stream proxying is on. Everything else is emitted byte for byte.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

use super::StreamUrlRewriter;
use super::renumber::renumber;
use crate::config::{ProxyConfig, RenumberMode, SourceConfig};
use crate::models::{ChannelMapping, M3uRewriteResult};

const EXTINF_PREFIX: &str = "#EXTINF:";

/// A key="value" attribute on an `#EXTINF` line
struct ExtinfAttribute {
    name: &'static str,
    pattern: Regex,
}

impl ExtinfAttribute {
    fn new(name: &'static str) -> Self {
        let pattern = Regex::new(&format!(r#"(?i)\b{}="([^"]*)""#, regex::escape(name)))
            .expect("attribute regex");
        Self { name, pattern }
    }

    /// Attribute value, with an empty value treated as missing
    fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Replace the first occurrence, or insert right after `#EXTINF:<duration>`
    fn set(&self, line: &str, value: &str) -> String {
        let attribute = format!(r#"{}="{}""#, self.name, value);

        if let Some(existing) = self.pattern.find(line) {
            let mut updated = String::with_capacity(line.len() + value.len());
            updated.push_str(&line[..existing.start()]);
            updated.push_str(&attribute);
            updated.push_str(&line[existing.end()..]);
            return updated;
        }

        match EXTINF_DURATION.find(line) {
            Some(duration) => {
                let mut updated = String::with_capacity(line.len() + attribute.len() + 1);
                updated.push_str(&line[..duration.end()]);
                updated.push(' ');
                updated.push_str(&attribute);
                updated.push_str(&line[duration.end()..]);
                updated
            }
            None => line.to_string(),
        }
    }
}

static TVG_ID: LazyLock<ExtinfAttribute> = LazyLock::new(|| ExtinfAttribute::new("tvg-id"));
static TVG_CHNO: LazyLock<ExtinfAttribute> = LazyLock::new(|| ExtinfAttribute::new("tvg-chno"));
static CHANNEL_ID: LazyLock<ExtinfAttribute> =
    LazyLock::new(|| ExtinfAttribute::new("channel-id"));

static EXTINF_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#EXTINF:-?\d+").expect("extinf duration regex"));

static ATTRIBUTE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)="(https?://[^"]+)""#).expect("attribute url regex"));

/// Rewrite a playlist for the client that asked for it via `request_host`
pub fn rewrite_m3u(
    content: &str,
    config: &ProxyConfig,
    source: &SourceConfig,
    request_host: &str,
) -> M3uRewriteResult {
    let urls = StreamUrlRewriter::for_request(config, request_host);
    let mode = config.effective_renumber(source);

    let mut mapping = ChannelMapping::new();
    let mut lines = Vec::new();
    let mut position = 0usize;

    for raw_line in content.split('\n') {
        let (line, line_ending) = match raw_line.strip_suffix('\r') {
            Some(stripped) => (stripped, "\r"),
            None => (raw_line, ""),
        };

        if line.starts_with(EXTINF_PREFIX) {
            let rewritten = rewrite_extinf(
                line,
                &mode,
                source.sync_channel_ids,
                position,
                &urls,
                &mut mapping,
            );
            lines.push(format!("{rewritten}{line_ending}"));
            position += 1;
        } else if line.starts_with("http://") || line.starts_with("https://") {
            match urls.rewrite(line.trim()) {
                Some(proxied) => lines.push(format!("{proxied}{line_ending}")),
                None => lines.push(raw_line.to_string()),
            }
        } else {
            lines.push(raw_line.to_string());
        }
    }

    debug!(
        "Rewrote playlist for source '{}': {} channels, {} mapping entries",
        source.name,
        position,
        mapping.len()
    );

    M3uRewriteResult {
        content: lines.join("\n"),
        channel_mapping: mapping,
    }
}

fn rewrite_extinf(
    line: &str,
    mode: &RenumberMode,
    sync_channel_ids: bool,
    position: usize,
    urls: &StreamUrlRewriter,
    mapping: &mut ChannelMapping,
) -> String {
    let tvg_id = TVG_ID.extract(line);
    let current_number = TVG_CHNO.extract(line);
    let new_number = renumber(mode, current_number, position);

    let mut line = line.to_string();

    if let Some(new_number) = new_number.as_deref() {
        // Guides reference channels by either key, record both
        if let Some(tvg_id) = tvg_id {
            mapping.insert(tvg_id, new_number);
        }
        if let Some(current) = current_number
            && Some(current) != tvg_id
        {
            mapping.insert(current, new_number);
        }

        if !mode.is_none() {
            line = TVG_CHNO.set(&line, new_number);
            if sync_channel_ids {
                line = TVG_ID.set(&line, new_number);
                line = CHANNEL_ID.set(&line, new_number);
            }
        }
    }

    if !urls.is_enabled() {
        return line;
    }

    ATTRIBUTE_URL
        .replace_all(&line, |caps: &Captures| match urls.rewrite(&caps[1]) {
            Some(proxied) => format!(r#"="{proxied}""#),
            None => caps[0].to_string(),
        })
        .into_owned()
}
