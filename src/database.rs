//! Database implementation
//!
//! `CounterexampleDatabase` ties together the entry table, the compression
//! registry and the serialization strategy behind one typed API.
//!
//! ## Locking
//!
//! The entry table and the database file sit behind one coarse
//! `parking_lot::Mutex`. Every operation that touches entries (reads
//! included) holds it exclusively for its whole duration: `store` holds it
//! across append, cleanup and the write-through to disk. Values are
//! compressed before the lock is taken. The compression registry and the
//! default algorithm name have their own `RwLock`s, which are never held
//! while waiting for the table lock. There is no finer-grained concurrency
//! than that; callers that need throughput should batch.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::constants::{
    BYTES_PER_MB, DEFAULT_COMPRESSION, DEFAULT_DATABASE_FILE, DEFAULT_MAX_DATABASE_SIZE_MB,
    DEFAULT_MAX_ENTRIES_PER_TEST, DEFAULT_RETENTION_HOURS, NO_COMPRESSION,
};
use crate::common::error::{DatabaseError, Result};
use crate::serialization::{SerializationFormat, SerializationStrategy};
use crate::storage::compression::{
    CompressionRegistry, CompressionStats, CompressionStrategy, NoCompression,
};
use crate::storage::entry::{CounterexampleEntry, EntryId, Metadata};
use crate::storage::entry_store::EntryStore;
use crate::storage::format;

/// Largest retention that still fits a chrono duration
const MAX_RETENTION_HOURS: u64 = (i64::MAX / 1000 / 3600) as u64;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (None for in-memory)
    pub database_path: Option<PathBuf>,
    /// Ceiling for the summed compressed size of all entries
    pub max_database_size_mb: usize,
    /// Newest entries kept per test name
    pub max_entries_per_test: usize,
    /// Entries older than this are removed by cleanup
    pub retention_hours: u64,
    /// Run retention cleanup and size enforcement after every store
    pub auto_cleanup: bool,
    /// Registry name of the codec used for new entries
    pub default_compression: String,
    /// Encoding used by the typed store/decompress helpers
    pub serialization: SerializationFormat,
    /// Rewrite the database file after every mutation
    pub persist_on_write: bool,
}

impl DatabaseConfig {
    /// Create a configuration for an in-memory database
    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            ..Default::default()
        }
    }

    /// Create a configuration for a file-based database
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            database_path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            DatabaseError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn with_max_database_size_mb(mut self, mb: usize) -> Self {
        self.max_database_size_mb = mb;
        self
    }

    pub fn with_max_entries_per_test(mut self, max: usize) -> Self {
        self.max_entries_per_test = max;
        self
    }

    pub fn with_retention_hours(mut self, hours: u64) -> Self {
        self.retention_hours = hours;
        self
    }

    pub fn with_auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    pub fn with_default_compression(mut self, name: impl Into<String>) -> Self {
        self.default_compression = name.into();
        self
    }

    pub fn with_serialization(mut self, format: SerializationFormat) -> Self {
        self.serialization = format;
        self
    }

    pub fn with_persist_on_write(mut self, enabled: bool) -> Self {
        self.persist_on_write = enabled;
        self
    }

    /// Size ceiling in bytes
    pub fn max_database_size_bytes(&self) -> u64 {
        (self.max_database_size_mb as u64).saturating_mul(BYTES_PER_MB as u64)
    }

    /// Retention period as a duration
    pub fn retention_period(&self) -> Duration {
        Duration::hours(self.retention_hours.min(MAX_RETENTION_HOURS) as i64)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            database_path: Some(PathBuf::from(DEFAULT_DATABASE_FILE)),
            max_database_size_mb: DEFAULT_MAX_DATABASE_SIZE_MB,
            max_entries_per_test: DEFAULT_MAX_ENTRIES_PER_TEST,
            retention_hours: DEFAULT_RETENTION_HOURS,
            auto_cleanup: true,
            default_compression: DEFAULT_COMPRESSION.to_string(),
            serialization: SerializationFormat::Json,
            persist_on_write: true,
        }
    }
}

/// Aggregate view over all entries, recomputed on every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub total_entries: usize,
    pub total_original_size: u64,
    pub total_compressed_size: u64,
    /// total_compressed_size / total_original_size; 1.0 when nothing was stored
    pub average_compression_ratio: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub entries_by_test: BTreeMap<String, usize>,
    pub entries_by_compression: BTreeMap<String, usize>,
}

impl DatabaseStats {
    pub fn from_entries(entries: &[CounterexampleEntry]) -> Self {
        let mut stats = DatabaseStats {
            total_entries: entries.len(),
            total_original_size: 0,
            total_compressed_size: 0,
            average_compression_ratio: 1.0,
            oldest_entry: None,
            newest_entry: None,
            entries_by_test: BTreeMap::new(),
            entries_by_compression: BTreeMap::new(),
        };

        for entry in entries {
            stats.total_original_size += entry.original_size;
            stats.total_compressed_size += entry.compressed_size;
            *stats
                .entries_by_test
                .entry(entry.test_name.clone())
                .or_insert(0) += 1;
            *stats
                .entries_by_compression
                .entry(entry.compression_algorithm.clone())
                .or_insert(0) += 1;

            if stats.oldest_entry.map_or(true, |oldest| entry.timestamp < oldest) {
                stats.oldest_entry = Some(entry.timestamp);
            }
            if stats.newest_entry.map_or(true, |newest| entry.timestamp > newest) {
                stats.newest_entry = Some(entry.timestamp);
            }
        }

        stats.average_compression_ratio = stats.compression_ratio();
        stats
    }
}

impl CompressionStats for DatabaseStats {
    fn uncompressed_size(&self) -> usize {
        self.total_original_size as usize
    }

    fn compressed_size(&self) -> usize {
        self.total_compressed_size as usize
    }
}

/// Counterexample database
pub struct CounterexampleDatabase {
    /// Configuration as constructed; the live default codec is tracked separately
    config: DatabaseConfig,
    default_compression: RwLock<String>,
    registry: RwLock<CompressionRegistry>,
    store: Mutex<EntryStore>,
    /// Cleared when the existing file could not be read
    write_through_enabled: AtomicBool,
}

impl CounterexampleDatabase {
    /// Create a database with every built-in codec registered
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        Self::with_registry(config, CompressionRegistry::with_builtins())
    }

    /// Create a database with an explicit set of codecs
    ///
    /// The passthrough codec is added under `none` when missing: it is the
    /// fallback for codecs that fail to compress.
    pub fn with_registry(
        config: DatabaseConfig,
        mut registry: CompressionRegistry,
    ) -> Result<Self> {
        if !registry.contains(NO_COMPRESSION) {
            registry.register(NO_COMPRESSION, Arc::new(NoCompression::new()));
        }
        if !registry.contains(&config.default_compression) {
            return Err(DatabaseError::UnknownCompression(
                config.default_compression.clone(),
            ));
        }

        let database = Self {
            default_compression: RwLock::new(config.default_compression.clone()),
            write_through_enabled: AtomicBool::new(config.persist_on_write),
            config,
            registry: RwLock::new(registry),
            store: Mutex::new(EntryStore::new()),
        };
        database.initialize_database();
        Ok(database)
    }

    /// Open (or create) a file-based database with default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(DatabaseConfig::from_file(path))
    }

    /// Create an in-memory database with default settings
    pub fn in_memory() -> Result<Self> {
        Self::new(DatabaseConfig::in_memory())
    }

    /// Load the database file if there is one; failures start empty
    fn initialize_database(&self) {
        let Some(path) = self.config.database_path.as_deref() else {
            return;
        };
        if !path.exists() {
            debug!(path = %path.display(), "no existing counterexample database");
            return;
        }

        match format::read_file(path) {
            Ok(entries) => {
                let mut store = self.store.lock();
                let loaded = store.extend(entries);
                info!(path = %path.display(), loaded, "loaded counterexample database");
            }
            Err(e) if e.is_format_error() => {
                warn!(path = %path.display(), error = %e, "failed to load existing database, starting empty");
                let mut quarantine = path.as_os_str().to_owned();
                quarantine.push(".corrupt");
                let quarantine = PathBuf::from(quarantine);
                if let Err(e) = std::fs::rename(path, &quarantine) {
                    warn!(error = %e, "could not move unreadable database aside");
                    self.write_through_enabled.store(false, Ordering::Relaxed);
                } else {
                    info!(path = %quarantine.display(), "moved unreadable database aside");
                }
            }
            Err(e) => {
                // The file may be fine; never overwrite what was not read
                warn!(path = %path.display(), error = %e, "could not read existing database, write-through disabled");
                self.write_through_enabled.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Store a serialized counterexample
    pub fn store(
        &self,
        test_name: &str,
        property_name: &str,
        value: &[u8],
        error_message: &str,
        metadata: Metadata,
    ) -> Result<EntryId> {
        let (algorithm, compressed) = self.compress_value(value)?;

        let mut store = self.store.lock();
        let timestamp = store.next_timestamp();
        let entry = CounterexampleEntry::new(
            test_name,
            property_name,
            compressed,
            algorithm,
            value.len() as u64,
            error_message,
            timestamp,
        )
        .with_metadata(metadata);
        let id = store.add_entry(entry);

        if self.config.auto_cleanup {
            self.run_cleanup(&mut store);
        }
        self.write_through(&store);

        Ok(id)
    }

    /// Serialize a value with the configured strategy, then store it
    pub fn store_typed<T: Serialize + ?Sized>(
        &self,
        test_name: &str,
        property_name: &str,
        value: &T,
        error_message: &str,
        metadata: Metadata,
    ) -> Result<EntryId> {
        let bytes = self.config.serialization.encode(value)?;
        self.store(test_name, property_name, &bytes, error_message, metadata)
    }

    pub fn get_by_test(&self, test_name: &str) -> Vec<CounterexampleEntry> {
        self.store.lock().query_by_test(test_name)
    }

    pub fn get_by_property(&self, property_name: &str) -> Vec<CounterexampleEntry> {
        self.store.lock().query_by_property(property_name)
    }

    /// Most recent entry of a test
    pub fn get_latest(&self, test_name: &str) -> Option<CounterexampleEntry> {
        self.store.lock().latest_for_test(test_name)
    }

    pub fn get_all(&self) -> Vec<CounterexampleEntry> {
        self.store.lock().entries().to_vec()
    }

    /// Restore the serialized value of an entry
    ///
    /// Returns `None` when the entry's codec is not registered, the data does
    /// not decompress, or the result has the wrong length.
    pub fn decompress(&self, entry: &CounterexampleEntry) -> Option<Vec<u8>> {
        let strategy = self.registry.read().get(&entry.compression_algorithm);
        let Some(strategy) = strategy else {
            debug!(
                algorithm = %entry.compression_algorithm,
                test = %entry.test_name,
                "entry uses an unregistered compression algorithm"
            );
            return None;
        };

        match strategy.decompress(&entry.compressed_data) {
            Ok(bytes) if bytes.len() as u64 == entry.original_size => Some(bytes),
            Ok(bytes) => {
                debug!(
                    expected = entry.original_size,
                    actual = bytes.len(),
                    test = %entry.test_name,
                    "decompressed size mismatch"
                );
                None
            }
            Err(e) => {
                debug!(error = %e, test = %entry.test_name, "failed to decompress entry");
                None
            }
        }
    }

    /// Restore and deserialize the value of an entry
    pub fn decompress_typed<T: DeserializeOwned>(&self, entry: &CounterexampleEntry) -> Option<T> {
        let bytes = self.decompress(entry)?;
        match self.config.serialization.decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, test = %entry.test_name, "failed to deserialize entry");
                None
            }
        }
    }

    /// Remove every entry
    pub fn clear(&self) -> usize {
        let mut store = self.store.lock();
        let removed = store.clear();
        self.write_through(&store);
        removed
    }

    /// Remove every entry of one test
    pub fn clear_test(&self, test_name: &str) -> usize {
        let mut store = self.store.lock();
        let removed = store.remove_test(test_name);
        self.write_through(&store);
        removed
    }

    /// Remove the entries with the given ids
    pub fn remove_entries(&self, ids: &[EntryId]) -> usize {
        let ids: HashSet<EntryId> = ids.iter().copied().collect();
        let mut store = self.store.lock();
        let removed = store.remove_ids(&ids);
        if removed > 0 {
            self.write_through(&store);
        }
        removed
    }

    /// Group entries by test and release spare capacity
    pub fn vacuum(&self) {
        let mut store = self.store.lock();
        store.vacuum();
        self.write_through(&store);
    }

    pub fn get_stats(&self) -> DatabaseStats {
        DatabaseStats::from_entries(self.store.lock().entries())
    }

    /// Write every entry to `path` in the binary file format
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let store = self.store.lock();
        format::write_file(path, store.entries())?;
        info!(path = %path.display(), entries = store.len(), "exported counterexamples");
        Ok(())
    }

    /// Append every entry of an export file
    ///
    /// The whole file is decoded before anything is added, so a bad file
    /// leaves the database untouched.
    pub fn import_from_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let entries = format::read_file(path)?;

        let mut store = self.store.lock();
        let imported = store.extend(entries);
        self.write_through(&store);
        info!(path = %path.display(), imported, "imported counterexamples");
        Ok(imported)
    }

    /// Add or replace the codec registered under `name`
    ///
    /// Replacing a codec that existing entries were written with makes those
    /// entries unreadable unless the new codec decodes the same data.
    pub fn register_compression(&self, name: &str, strategy: Arc<dyn CompressionStrategy>) {
        if strategy.name() != name {
            debug!(name, codec = strategy.name(), "registering codec under a different name");
        }
        if self.registry.write().register(name, strategy).is_some() {
            warn!(name, "replaced registered compression strategy");
        }
    }

    /// Change the codec used for new entries
    pub fn set_default_compression(&self, name: &str) -> Result<()> {
        if !self.registry.read().contains(name) {
            return Err(DatabaseError::UnknownCompression(name.to_string()));
        }
        *self.default_compression.write() = name.to_string();
        Ok(())
    }

    pub fn default_compression(&self) -> String {
        self.default_compression.read().clone()
    }

    pub fn compression_names(&self) -> Vec<String> {
        self.registry.read().names()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn serialization(&self) -> SerializationFormat {
        self.config.serialization
    }

    /// Whether mutations are currently written through to the database file
    pub fn persists_on_write(&self) -> bool {
        self.config.database_path.is_some()
            && self.write_through_enabled.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Run retention cleanup and size enforcement now
    pub fn run_maintenance(&self) -> usize {
        let mut store = self.store.lock();
        let removed = self.run_cleanup(&mut store);
        if removed > 0 {
            self.write_through(&store);
        }
        removed
    }

    /// Write the table to the database file now
    pub fn sync(&self) -> Result<()> {
        let Some(path) = self.config.database_path.as_deref() else {
            return Ok(());
        };
        let store = self.store.lock();
        format::write_file(path, store.entries())
    }

    fn compress_value(&self, value: &[u8]) -> Result<(String, Vec<u8>)> {
        let algorithm = self.default_compression.read().clone();
        let strategy = self
            .registry
            .read()
            .get(&algorithm)
            .ok_or_else(|| DatabaseError::UnknownCompression(algorithm.clone()))?;

        match strategy.compress(value) {
            Ok(compressed) => Ok((algorithm, compressed)),
            Err(e) => {
                warn!(algorithm = %algorithm, error = %e, "compression failed, storing uncompressed");
                Ok((NO_COMPRESSION.to_string(), value.to_vec()))
            }
        }
    }

    fn run_cleanup(&self, store: &mut EntryStore) -> usize {
        let expired = self.cleanup_old_entries(store);
        let evicted = self.enforce_size_limits(store);
        if expired + evicted > 0 {
            debug!(expired, evicted, remaining = store.len(), "counterexample maintenance");
        }
        expired + evicted
    }

    fn cleanup_old_entries(&self, store: &mut EntryStore) -> usize {
        match Utc::now().checked_sub_signed(self.config.retention_period()) {
            Some(cutoff) => store.remove_old_entries(cutoff),
            None => 0,
        }
    }

    fn enforce_size_limits(&self, store: &mut EntryStore) -> usize {
        store.enforce_limits(
            self.config.max_entries_per_test,
            self.config.max_database_size_bytes(),
        )
    }

    /// Persist after a mutation; failures are logged, `sync` reports them
    fn write_through(&self, store: &EntryStore) {
        if !self.persists_on_write() {
            return;
        }
        if let Some(path) = self.config.database_path.as_deref() {
            if let Err(e) = format::write_file(path, store.entries()) {
                warn!(path = %path.display(), error = %e, "failed to persist counterexample database");
            }
        }
    }
}

impl std::fmt::Debug for CounterexampleDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterexampleDatabase")
            .field("config", &self.config)
            .field("default_compression", &*self.default_compression.read())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> CounterexampleDatabase {
        CounterexampleDatabase::new(DatabaseConfig::in_memory()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_database_size_mb, 100);
        assert_eq!(config.max_database_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.max_entries_per_test, 10);
        assert_eq!(config.retention_period(), Duration::days(30));
        assert!(config.auto_cleanup);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("pbt_counterexamples.db"))
        );
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"max_entries_per_test": 3, "serialization": "binary"}"#)
                .unwrap();
        assert_eq!(config.max_entries_per_test, 3);
        assert_eq!(config.serialization, SerializationFormat::Binary);
        assert_eq!(config.retention_hours, DEFAULT_RETENTION_HOURS);
    }

    #[test]
    fn test_huge_retention_does_not_panic() {
        let config = DatabaseConfig::in_memory().with_retention_hours(u64::MAX);
        let db = CounterexampleDatabase::new(config).unwrap();
        db.store("t", "p", b"x", "e", Metadata::new()).unwrap();
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_unknown_default_rejected_at_construction() {
        let config = DatabaseConfig::in_memory().with_default_compression("brotli");
        let err = CounterexampleDatabase::new(config).unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownCompression(name) if name == "brotli"));
    }

    #[test]
    fn test_store_records_sizes() {
        let db = memory_db();
        let value = b"circle r=0".repeat(20);
        let id = db
            .store("parse", "roundtrip", &value, "mismatch", Metadata::new())
            .unwrap();

        let entry = db.get_latest("parse").unwrap();
        assert_eq!(entry.id(), id);
        assert_eq!(entry.original_size, value.len() as u64);
        assert_eq!(entry.compressed_size, entry.compressed_data.len() as u64);
        assert_eq!(entry.compression_algorithm, db.default_compression());
        assert_eq!(db.decompress(&entry).unwrap(), value);
    }

    #[test]
    fn test_stats_on_empty_database() {
        let stats = memory_db().get_stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.average_compression_ratio, 1.0);
        assert!(stats.oldest_entry.is_none());
    }

    struct FailingCodec;

    impl CompressionStrategy for FailingCodec {
        fn compress(&self, _data: &[u8]) -> crate::storage::compression::CompressionResult<Vec<u8>> {
            Err(crate::storage::compression::CompressionError::CompressionFailed(
                "always".to_string(),
            ))
        }

        fn decompress(&self, _data: &[u8]) -> crate::storage::compression::CompressionResult<Vec<u8>> {
            Err(crate::storage::compression::CompressionError::EmptyInput)
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn expected_ratio(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn test_failing_codec_falls_back_to_none() {
        let db = memory_db();
        db.register_compression("failing", Arc::new(FailingCodec));
        db.set_default_compression("failing").unwrap();

        db.store("t", "p", b"payload", "e", Metadata::new()).unwrap();
        let entry = db.get_latest("t").unwrap();
        assert_eq!(entry.compression_algorithm, "none");
        assert_eq!(db.decompress(&entry).unwrap(), b"payload");
    }

    #[test]
    fn test_empty_registry_gets_fallback_codec() {
        let config = DatabaseConfig::in_memory().with_default_compression("none");
        let db = CounterexampleDatabase::with_registry(config, CompressionRegistry::empty()).unwrap();
        assert_eq!(db.compression_names(), vec!["none".to_string()]);
    }
}
