/// No compression - passthrough codec
///
/// This is the safety fallback used when another codec misbehaves, and a
/// sensible default for payloads that are already tiny. Both directions
/// return the input unchanged, so it is total over every byte sequence,
/// including the empty one.
use crate::common::constants::NO_COMPRESSION;
use crate::storage::compression::traits::{CompressionResult, CompressionStrategy};

/// Identity codec
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl NoCompression {
    /// Creates a new passthrough codec
    pub fn new() -> Self {
        Self
    }
}

impl CompressionStrategy for NoCompression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>> {
        Ok(compressed.to_vec())
    }

    fn name(&self) -> &str {
        NO_COMPRESSION
    }

    fn expected_ratio(&self) -> f64 {
        1.0
    }
}
