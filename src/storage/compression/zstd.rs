/// Zstd compression (best for general data)
///
/// Two codecs live here:
/// - `ZstdCompression`: plain levelled zstd frames
/// - `ZstdDictionaryCompression`: frames compressed against a shared
///   dictionary, trained from sample counterexamples with `train_dictionary`
///
/// Dictionary frames cannot be decoded without the exact same dictionary, so
/// the dictionary codec registers under its own name.
use std::io::{Read, Write};

use crate::storage::compression::traits::{
    CompressionError, CompressionResult, CompressionStrategy,
};

/// Default zstd level (3 = fast with good compression)
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Default size budget for trained dictionaries (100KB)
pub const DEFAULT_DICTIONARY_SIZE: usize = 100 * 1024;

/// Zstd codec
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompression {
    /// 1-22, higher = better compression
    level: i32,
}

impl ZstdCompression {
    pub fn new() -> Self {
        Self {
            level: DEFAULT_ZSTD_LEVEL,
        }
    }

    pub fn with_level(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompression {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionStrategy for ZstdCompression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        zstd::stream::encode_all(data, self.level)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
    }

    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>> {
        if compressed.is_empty() {
            return Err(CompressionError::EmptyInput);
        }
        zstd::stream::decode_all(compressed)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        "zstd"
    }

    fn expected_ratio(&self) -> f64 {
        0.3
    }
}

/// Trains a zstd dictionary from sample payloads
pub fn train_dictionary<S: AsRef<[u8]>>(
    samples: &[S],
    max_size: usize,
) -> CompressionResult<Vec<u8>> {
    if samples.is_empty() {
        return Err(CompressionError::EmptyInput);
    }
    zstd::dict::from_samples(samples, max_size).map_err(|e| {
        CompressionError::CompressionFailed(format!("Dictionary training failed: {}", e))
    })
}

/// Zstd codec bound to a dictionary
#[derive(Debug, Clone)]
pub struct ZstdDictionaryCompression {
    name: String,
    level: i32,
    dictionary: Vec<u8>,
}

impl ZstdDictionaryCompression {
    /// Creates a dictionary codec registered as `zstd-dict`
    pub fn new(dictionary: Vec<u8>) -> Self {
        Self::with_name("zstd-dict", DEFAULT_ZSTD_LEVEL, dictionary)
    }

    /// Creates a dictionary codec with a custom persisted name
    ///
    /// Use a distinct name per dictionary: entries only record the name.
    pub fn with_name(name: impl Into<String>, level: i32, dictionary: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            level: level.clamp(1, 22),
            dictionary,
        }
    }

    /// Trains a dictionary from samples and builds the codec from it
    pub fn train<S: AsRef<[u8]>>(samples: &[S], max_size: usize) -> CompressionResult<Self> {
        Ok(Self::new(train_dictionary(samples, max_size)?))
    }

    pub fn dictionary(&self) -> &[u8] {
        &self.dictionary
    }
}

impl CompressionStrategy for ZstdDictionaryCompression {
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        let mut encoder =
            zstd::stream::Encoder::with_dictionary(Vec::new(), self.level, &self.dictionary)
                .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
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
        let mut decoder = zstd::stream::Decoder::with_dictionary(compressed, &self.dictionary)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
        Ok(decompressed)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn expected_ratio(&self) -> f64 {
        0.2
    }
}
