/// Compression strategy trait
///
/// Every codec implements this trait so the database can pick one by name,
/// store the name next to the compressed bytes, and find the matching
/// decompressor later.
use std::error::Error;
use std::fmt;

/// Compression error type
#[derive(Debug, Clone)]
pub enum CompressionError {
    /// Input is empty where the codec requires a stream
    EmptyInput,

    /// Compression failed
    CompressionFailed(String),

    /// Decompression failed
    DecompressionFailed(String),

    /// Data corruption detected
    CorruptedData(String),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::EmptyInput => write!(f, "Empty input"),
            CompressionError::CompressionFailed(msg) => write!(f, "Compression failed: {}", msg),
            CompressionError::DecompressionFailed(msg) => {
                write!(f, "Decompression failed: {}", msg)
            }
            CompressionError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl Error for CompressionError {}

/// Result type for compression operations
pub type CompressionResult<T> = Result<T, CompressionError>;

/// Compression strategy trait
///
/// `name()` is persisted inside every entry and every export file. Reusing a
/// name for a codec with different semantics makes stored data unreadable.
pub trait CompressionStrategy: Send + Sync {
    /// Compresses a byte sequence
    ///
    /// Built-in codecs never fail on in-memory input, including empty input.
    fn compress(&self, data: &[u8]) -> CompressionResult<Vec<u8>>;

    /// Restores the original bytes, or reports why it could not
    fn decompress(&self, compressed: &[u8]) -> CompressionResult<Vec<u8>>;

    /// Stable identifier of this codec
    fn name(&self) -> &str;

    /// Advisory compressed/original ratio this codec usually reaches
    fn expected_ratio(&self) -> f64;
}

/// Helper trait for compression statistics
pub trait CompressionStats {
    /// Returns the uncompressed size
    fn uncompressed_size(&self) -> usize;

    /// Returns the compressed size
    fn compressed_size(&self) -> usize;

    /// Returns compressed size over uncompressed size (1.0 when nothing was stored)
    fn compression_ratio(&self) -> f64 {
        if self.uncompressed_size() > 0 {
            self.compressed_size() as f64 / self.uncompressed_size() as f64
        } else {
            1.0
        }
    }

    /// Returns the space savings as a percentage
    fn space_savings(&self) -> f64 {
        (1.0 - self.compression_ratio()) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStats {
        uncompressed: usize,
        compressed: usize,
    }

    impl CompressionStats for MockStats {
        fn uncompressed_size(&self) -> usize {
            self.uncompressed
        }

        fn compressed_size(&self) -> usize {
            self.compressed
        }
    }

    #[test]
    fn test_compression_ratio() {
        let stats = MockStats {
            uncompressed: 1000,
            compressed: 100,
        };
        assert_eq!(stats.compression_ratio(), 0.1);

        let empty = MockStats {
            uncompressed: 0,
            compressed: 0,
        };
        assert_eq!(empty.compression_ratio(), 1.0);
    }

    #[test]
    fn test_space_savings() {
        let stats = MockStats {
            uncompressed: 1000,
            compressed: 100,
        };
        assert!((stats.space_savings() - 90.0).abs() < 0.0001);

        let stats2 = MockStats {
            uncompressed: 1000,
            compressed: 800,
        };
        // Use approximate equality due to floating point precision
        let savings = stats2.space_savings();
        assert!((savings - 20.0).abs() < 0.0001);
    }

    #[test]
    fn test_compression_error_display() {
        let err = CompressionError::EmptyInput;
        assert_eq!(format!("{}", err), "Empty input");

        let err = CompressionError::DecompressionFailed("failed".to_string());
        assert_eq!(format!("{}", err), "Decompression failed: failed");
    }
}
