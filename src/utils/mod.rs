//! Utility modules shared by the services and web layer

pub mod decompression;
pub mod http_client;
pub mod url;

pub use decompression::{CompressionFormat, DecompressionService};
pub use http_client::{StandardHttpClient, UpstreamFetcher};
pub use url::UrlUtils;
