//! Transparent decompression of upstream payloads
//!
//! Guides in particular are often published as `.xml.gz`. Detection is by
//! magic bytes, not by URL or `Content-Type`.

use bytes::Bytes;

use crate::errors::{SourceError, SourceResult};

/// Compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

pub struct DecompressionService;

impl DecompressionService {
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data).map(|kind| kind.mime_type()) {
            Some("application/gzip") => CompressionFormat::Gzip,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Decompress `data` if it is compressed, otherwise return it as is
    pub fn decompress(data: Bytes) -> SourceResult<Vec<u8>> {
        match Self::detect_compression_format(&data) {
            CompressionFormat::Gzip => Self::decompress_gzip(data),
            CompressionFormat::Uncompressed => Ok(data.to_vec()),
        }
    }

    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(data: Bytes) -> SourceResult<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let mut decoder = GzDecoder::new(data.as_ref());
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| SourceError::parse("gzip", format!("Failed to decompress gzip data: {e}")))?;
        Ok(decompressed)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(_data: Bytes) -> SourceResult<Vec<u8>> {
        Err(SourceError::parse(
            "gzip",
            "gzip payload received but gzip support is not compiled in",
        ))
    }
}
