//! Counterexample records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::compression::CompressionStats;

/// In-memory identity of an entry, assigned in insertion order
///
/// Ids are not persisted. Loading or importing a file assigns fresh ids in
/// file order.
pub type EntryId = u64;

/// Free-form annotations attached to a counterexample
pub type Metadata = BTreeMap<String, String>;

/// One recorded property failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterexampleEntry {
    #[serde(skip)]
    pub(crate) id: EntryId,
    pub test_name: String,
    pub property_name: String,
    /// Serialized, then compressed, failing value
    pub compressed_data: Vec<u8>,
    /// Registry name of the codec that produced `compressed_data`
    pub compression_algorithm: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
    /// Serialized size before compression
    pub original_size: u64,
    /// Always `compressed_data.len()`
    pub compressed_size: u64,
    pub metadata: Metadata,
}

impl CounterexampleEntry {
    /// Builds a record; the id is assigned when the entry store accepts it
    pub fn new(
        test_name: impl Into<String>,
        property_name: impl Into<String>,
        compressed_data: Vec<u8>,
        compression_algorithm: impl Into<String>,
        original_size: u64,
        error_message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let compressed_size = compressed_data.len() as u64;
        Self {
            id: 0,
            test_name: test_name.into(),
            property_name: property_name.into(),
            compressed_data,
            compression_algorithm: compression_algorithm.into(),
            error_message: error_message.into(),
            timestamp: truncate_to_millis(timestamp),
            original_size,
            compressed_size,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Ordering key for "newest"/"oldest": timestamp, then insertion order
    pub fn recency_key(&self) -> (DateTime<Utc>, EntryId) {
        (self.timestamp, self.id)
    }

    /// Compares every field the file format persists
    pub fn same_record(&self, other: &CounterexampleEntry) -> bool {
        self.test_name == other.test_name
            && self.property_name == other.property_name
            && self.compressed_data == other.compressed_data
            && self.compression_algorithm == other.compression_algorithm
            && self.error_message == other.error_message
            && self.timestamp == other.timestamp
            && self.original_size == other.original_size
            && self.compressed_size == other.compressed_size
            && self.metadata == other.metadata
    }
}

impl CompressionStats for CounterexampleEntry {
    fn uncompressed_size(&self) -> usize {
        self.original_size as usize
    }

    fn compressed_size(&self) -> usize {
        self.compressed_size as usize
    }
}

/// Drops sub-millisecond precision so timestamps survive the file format
pub fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}
