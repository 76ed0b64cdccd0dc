//! XMLTV guide rewriting
//!
//! Icon URLs are routed through the proxy, and channel identifiers are brought
//! in line with the numbers assigned by the playlist rewrite so that clients
//! can join the two documents.

use regex::{Captures, NoExpand, Regex};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::StreamUrlRewriter;
use crate::config::ProxyConfig;
use crate::models::ChannelMapping;

static ICON_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)src="(https?://[^"]+)""#).expect("icon src regex"));

static CHANNEL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<channel\s+(?:[^>]*?\s)?)id="([^"]+)""#).expect("channel id regex")
});

static PROGRAMME_CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<programme\s+(?:[^>]*?\s)?)channel="([^"]+)""#)
        .expect("programme channel regex")
});

/// A whole `<channel>` element; group 2 is the body unless the element is self-closing
static CHANNEL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<channel\s+(?:[^>]*?\s)?id="([^"]+)"[^>]*?(?:/>|>(.*?)</channel>)"#)
        .expect("channel block regex")
});

static LCN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<lcn>[^<]*</lcn>").expect("lcn regex"));

/// Rewrite a guide using the mapping produced by the latest playlist rewrite
pub fn rewrite_epg(
    content: &str,
    config: &ProxyConfig,
    request_host: &str,
    mapping: &ChannelMapping,
) -> String {
    let urls = StreamUrlRewriter::for_request(config, request_host);
    let mut result = Cow::Borrowed(content);

    if urls.is_enabled() {
        result = Cow::Owned(
            ICON_SRC
                .replace_all(&result, |caps: &Captures| match urls.rewrite(&caps[1]) {
                    Some(proxied) => format!(r#"src="{proxied}""#),
                    None => caps[0].to_string(),
                })
                .into_owned(),
        );
    }

    if mapping.is_empty() {
        debug!("No channel mapping available, guide channel ids left as is");
        return result.into_owned();
    }

    let result = CHANNEL_ID.replace_all(&result, |caps: &Captures| match mapping.get(&caps[2]) {
        Some(new_id) => format!(r#"{}id="{}""#, &caps[1], new_id),
        None => caps[0].to_string(),
    });

    let result = PROGRAMME_CHANNEL.replace_all(&result, |caps: &Captures| {
        match mapping.get(&caps[2]) {
            Some(new_id) => format!(r#"{}channel="{}""#, &caps[1], new_id),
            None => caps[0].to_string(),
        }
    });

    let new_numbers = mapping.new_numbers();
    CHANNEL_BLOCK
        .replace_all(&result, |caps: &Captures| restate_lcn(caps, &new_numbers))
        .into_owned()
}

/// Make the `<lcn>` of a remapped channel repeat its new id
fn restate_lcn(caps: &Captures, new_numbers: &HashSet<&str>) -> String {
    let element = &caps[0];
    let channel_id = &caps[1];

    let Some(body) = caps.get(2) else {
        return element.to_string();
    };
    if !new_numbers.contains(channel_id) {
        return element.to_string();
    }

    let element_start = caps.get(0).map_or(0, |m| m.start());
    let body_start = body.start() - element_start;
    let body_end = body_start + body.len();
    let lcn = format!("<lcn>{channel_id}</lcn>");
    let updated_body = LCN.replace(body.as_str(), NoExpand(&lcn));

    format!(
        "{}{}{}",
        &element[..body_start],
        updated_body,
        &element[body_end..]
    )
}
