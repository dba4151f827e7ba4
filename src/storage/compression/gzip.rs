/// Gzip compression (DEFLATE family, always available)
///
/// The general-purpose codec every database registers. Output is
/// deterministic for a given level because flate2 writes a zero mtime into
/// the gzip header.
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::common::constants::GZIP_COMPRESSION;
use crate::storage::compression::traits::{
    CompressionError, CompressionResult, CompressionStrategy,
};

/// Gzip codec
#[derive(Debug, Clone, Copy)]
pub struct GzipCompression {
    /// 0-9, higher = better compression
    level: u32,
}

impl GzipCompression {
    /// Creates a gzip codec with the default level (6)
    pub fn new() -> Self {
        Self { level: 6 }
    }

    /// Creates a gzip codec with a custom level, clamped to 0-9
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for GzipCompression {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionStrategy for GzipCompression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2 + 32),
            Compression::new(self.level),
        );
        encoder
            .write_all(data)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
    }

    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>> {
        if compressed.is_empty() {
            return Err(CompressionError::EmptyInput);
        }

        // read_to_end keeps growing the buffer until the stream-end marker,
        // and leaves it at exactly the decompressed length
        let mut decoder = GzDecoder::new(compressed);
        let mut decompressed = Vec::with_capacity(compressed.len().saturating_mul(4));
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;

        Ok(decompressed)
    }

    fn name(&self) -> &str {
        GZIP_COMPRESSION
    }

    fn expected_ratio(&self) -> f64 {
        0.35
    }
}
