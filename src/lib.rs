//! cxdb - Counterexample Database
//!
//! cxdb durably keeps the failing inputs ("counterexamples") found by
//! property-based tests so they can be replayed as regression cases on every
//! later run. Values are serialized, compressed with a pluggable codec and
//! stored in a single versioned binary file, with retention and size-bounded
//! eviction.
//!
pub mod common;
pub mod database;
pub mod replay;
pub mod serialization;
pub mod storage;

// Re-export common types for convenience
pub use common::{DatabaseError, Result};

// Re-export database for convenience
pub use crate::database::{CounterexampleDatabase, DatabaseConfig, DatabaseStats};

// Re-export replay system for convenience
pub use replay::{
    minimize, CounterexampleReplayer, MinimizeConfig, MinimizeResult, MinimizedCounterexample,
    Property, ReplayOutcome, ReplayReport, Shrinker, UnreadablePolicy, Verdict,
};

// Re-export serialization for convenience
pub use serialization::{
    BinarySerialization, JsonSerialization, SerializationFormat, SerializationStrategy,
};

// Re-export storage system for convenience
pub use storage::{
    CompressionError, CompressionRegistry, CompressionResult, CompressionStats,
    CompressionStrategy, CounterexampleEntry, EntryId, EntryStore, GzipCompression, Metadata,
    NoCompression,
};

#[cfg(feature = "compression")]
pub use storage::{Lz4Compression, SnappyCompression, ZstdCompression, ZstdDictionaryCompression};
