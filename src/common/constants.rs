//! Constants used throughout cxdb

/// Magic tag at the start of every database and export file
pub const STORAGE_MAGIC: &[u8; 4] = b"PBTC";

/// File format version written by this build
pub const STORAGE_FORMAT_VERSION: u32 = 2;

/// Oldest file format version this build can still read (no metadata)
pub const STORAGE_FORMAT_VERSION_V1: u32 = 1;

/// Default database file name
pub const DEFAULT_DATABASE_FILE: &str = "pbt_counterexamples.db";

/// Default ceiling for the summed compressed size of all entries
pub const DEFAULT_MAX_DATABASE_SIZE_MB: usize = 100;

/// Default number of entries retained per test
pub const DEFAULT_MAX_ENTRIES_PER_TEST: usize = 10;

/// Default retention period (30 days)
pub const DEFAULT_RETENTION_HOURS: u64 = 24 * 30;

/// Bytes per megabyte for the size ceiling
pub const BYTES_PER_MB: usize = 1024 * 1024;

/// Name of the identity codec
pub const NO_COMPRESSION: &str = "none";

/// Name of the DEFLATE-family codec that is always available
pub const GZIP_COMPRESSION: &str = "gzip";

/// Default compression algorithm for new entries
#[cfg(feature = "compression")]
pub const DEFAULT_COMPRESSION: &str = "zstd";

/// Default compression algorithm for new entries
#[cfg(not(feature = "compression"))]
pub const DEFAULT_COMPRESSION: &str = GZIP_COMPRESSION;
