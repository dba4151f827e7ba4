/// LZ4 compression (fast with decent ratio)
///
/// Blocks are written with a 4-byte size prefix so decompression does not
/// need the original length from the caller.
use lz4::block::CompressionMode;

use crate::storage::compression::traits::{
    CompressionError, CompressionResult, CompressionStrategy,
};

/// LZ4 block codec
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compression {
    high_compression: bool,
    /// Higher = faster but worse ratio; ignored in high-compression mode
    acceleration: i32,
}

impl Lz4Compression {
    pub fn new() -> Self {
        Self {
            high_compression: false,
            acceleration: 1,
        }
    }

    /// Slower LZ4-HC mode with a better ratio
    pub fn high_compression() -> Self {
        Self {
            high_compression: true,
            acceleration: 1,
        }
    }

    pub fn with_acceleration(acceleration: i32) -> Self {
        Self {
            high_compression: false,
            acceleration: acceleration.max(1),
        }
    }

    fn mode(&self) -> CompressionMode {
        if self.high_compression {
            CompressionMode::HIGHCOMPRESSION(9)
        } else if self.acceleration > 1 {
            CompressionMode::FAST(self.acceleration)
        } else {
            CompressionMode::DEFAULT
        }
    }
}

impl Default for Lz4Compression {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionStrategy for Lz4Compression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        lz4::block::compress(data, Some(self.mode()), true)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
    }

    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>> {
        if compressed.len() < 4 {
            return Err(CompressionError::CorruptedData(format!(
                "LZ4 block too short: {} bytes",
                compressed.len()
            )));
        }
        lz4::block::decompress(compressed, None)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        "lz4"
    }

    fn expected_ratio(&self) -> f64 {
        0.5
    }
}
