use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Original channel key (a `tvg-id` or an upstream channel number) to new channel number
///
/// Built on every playlist rewrite and handed to the guide rewriter so both
/// documents agree on channel identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelMapping {
    entries: HashMap<String, String>,
}

impl ChannelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries for the same key replace earlier ones
    pub fn insert(&mut self, original: impl Into<String>, new_number: impl Into<String>) {
        self.entries.insert(original.into(), new_number.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every new channel number this mapping can produce
    pub fn new_numbers(&self) -> HashSet<&str> {
        self.entries.values().map(String::as_str).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ChannelMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut mapping = ChannelMapping::new();
        for (original, new_number) in iter {
            mapping.insert(original, new_number);
        }
        mapping
    }
}

/// Output of a playlist rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uRewriteResult {
    pub content: String,
    pub channel_mapping: ChannelMapping,
}

/// Whether a response was served from cached upstream content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheStatus::Hit)
    }

    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A rewritten document ready to be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDocument {
    pub body: String,
    pub cache_status: CacheStatus,
}
