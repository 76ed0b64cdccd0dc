//! Services shared by the HTTP handlers

pub mod playlist_service;
pub mod source_cache;

pub use playlist_service::PlaylistService;
pub use source_cache::{CacheEntry, CacheLookup, CacheSpace, SourceCache};
