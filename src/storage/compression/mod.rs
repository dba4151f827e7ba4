//! Compression module for the counterexample store
//!
//! Counterexamples are serialized first and then compressed with one of the
//! codecs below. The codec name is stored with each entry so the matching
//! decompressor can be found later.
//!
//! ## Supported Compression Algorithms:
//!
//! - **none**: Passthrough, safety fallback for misbehaving codecs
//! - **gzip**: DEFLATE family, always available
//! - **zstd**: Best general ratio (feature `compression`)
//! - **zstd-dict**: zstd against a trained dictionary (feature `compression`)
//! - **lz4**: Fast block codec (feature `compression`)
//! - **snappy**: Fastest, lowest ratio (feature `compression`)
//!
//! ## Usage Example:
//!
//! ```ignore
//! use cxdb::storage::compression::*;
//!
//! let codec = GzipCompression::new();
//! let compressed = codec.compress(b"counterexample")?;
//! let restored = codec.decompress(&compressed)?;
//! ```

pub mod gzip;
#[cfg(feature = "compression")]
pub mod lz4;
pub mod none;
pub mod registry;
#[cfg(feature = "compression")]
pub mod snappy;
pub mod traits;
#[cfg(feature = "compression")]
pub mod zstd;

pub use gzip::GzipCompression;
pub use none::NoCompression;
pub use registry::{CompressionRegistry, StrategyRef};
pub use traits::{CompressionError, CompressionResult, CompressionStats, CompressionStrategy};

#[cfg(feature = "compression")]
pub use self::lz4::Lz4Compression;
#[cfg(feature = "compression")]
pub use self::snappy::SnappyCompression;
#[cfg(feature = "compression")]
pub use self::zstd::{train_dictionary, ZstdCompression, ZstdDictionaryCompression};
