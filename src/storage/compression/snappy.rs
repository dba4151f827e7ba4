/// Snappy compression (highest speed, lowest ratio)
use crate::storage::compression::traits::{
    CompressionError, CompressionResult, CompressionStrategy,
};

/// Snappy raw-format codec
#[derive(Debug, Default, Clone, Copy)]
pub struct SnappyCompression;

impl SnappyCompression {
    pub fn new() -> Self {
        Self
    }
}

impl CompressionStrategy for SnappyCompression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
    }

    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>> {
        if compressed.is_empty() {
            return Err(CompressionError::EmptyInput);
        }
        snap::raw::Decoder::new()
            .decompress_vec(compressed)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        "snappy"
    }

    fn expected_ratio(&self) -> f64 {
        0.6
    }
}
