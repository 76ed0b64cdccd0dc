/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

// Proxy defaults
pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_PROXY_STREAMS: bool = false;
pub const DEFAULT_CACHE_DURATION_SECS: u64 = 300;

// Upstream fetch defaults
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_USER_AGENT: &str = concat!("playlist-proxy/", env!("CARGO_PKG_VERSION"));
