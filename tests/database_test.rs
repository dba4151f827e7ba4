use std::sync::Arc;

use chrono::{Duration, Utc};
use cxdb::storage::format;
use cxdb::CounterexampleEntry;
use tempfile::tempdir;

use cxdb::{
    CompressionRegistry, CounterexampleDatabase, DatabaseConfig, Metadata, NoCompression, Result,
    SerializationFormat,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Segment {
    start: (f64, f64),
    end: (f64, f64),
    layer: String,
}

fn segment(n: u32) -> Segment {
    Segment {
        start: (0.0, f64::from(n)),
        end: (f64::from(n) * 0.5, -1.25),
        layer: format!("layer-{}", n),
    }
}

#[test]
fn test_per_test_cap_keeps_latest() -> Result<()> {
    let config = DatabaseConfig::in_memory().with_max_entries_per_test(2);
    let db = CounterexampleDatabase::new(config)?;

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(db.store_typed("T", "closed", &segment(n), "open contour", Metadata::new())?);
    }

    let entries = db.get_by_test("T");
    assert_eq!(entries.len(), 2);

    let latest = db.get_latest("T").unwrap();
    assert_eq!(latest.id(), ids[2]);
    assert_eq!(db.decompress_typed::<Segment>(&latest), Some(segment(2)));

    // The first entry was the one evicted
    assert!(entries.iter().all(|entry| entry.id() != ids[0]));
    Ok(())
}

#[test]
fn test_no_op_only_registry_ratio_is_one() -> Result<()> {
    let mut registry = CompressionRegistry::empty();
    registry.register("none", Arc::new(NoCompression::new()));
    let config = DatabaseConfig::in_memory().with_default_compression("none");
    let db = CounterexampleDatabase::with_registry(config, registry)?;

    db.store("T", "p", b"0123456789", "failed", Metadata::new())?;

    let stats = db.get_stats();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_original_size, 10);
    assert_eq!(stats.total_compressed_size, 10);
    assert_eq!(stats.average_compression_ratio, 1.0);
    Ok(())
}

#[test]
fn test_size_accounting_for_every_codec() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    let value = br#"{"entity":"LWPOLYLINE","points":[[0,0],[1,1],[2,0]]}"#.repeat(8);

    for name in db.compression_names() {
        db.set_default_compression(&name)?;
        db.store(&name, "p", &value, "e", Metadata::new())?;

        let entry = db.get_latest(&name).unwrap();
        assert_eq!(entry.compression_algorithm, name);
        assert_eq!(entry.compressed_size, entry.compressed_data.len() as u64);
        assert_eq!(entry.original_size, value.len() as u64);
        assert_eq!(db.decompress(&entry).unwrap(), value, "codec {}", name);
    }
    Ok(())
}

#[test]
fn test_typed_roundtrip_both_formats() -> Result<()> {
    for format in [SerializationFormat::Json, SerializationFormat::Binary] {
        let config = DatabaseConfig::in_memory().with_serialization(format);
        let db = CounterexampleDatabase::new(config)?;
        db.store_typed("T", "p", &segment(7), "e", Metadata::new())?;

        let entry = db.get_latest("T").unwrap();
        assert_eq!(db.decompress_typed::<Segment>(&entry), Some(segment(7)));
    }
    Ok(())
}

#[test]
fn test_global_size_cap_evicts_oldest() -> Result<()> {
    let config = DatabaseConfig::in_memory()
        .with_max_database_size_mb(1)
        .with_max_entries_per_test(100)
        .with_default_compression("none");
    let db = CounterexampleDatabase::new(config)?;

    let chunk = vec![7u8; 300 * 1024];
    let mut ids = Vec::new();
    for n in 0..5 {
        ids.push(db.store(&format!("T{}", n), "p", &chunk, "e", Metadata::new())?);
    }

    let stats = db.get_stats();
    assert!(stats.total_compressed_size <= 1024 * 1024);
    assert_eq!(stats.total_entries, 3);

    let remaining: Vec<_> = db.get_all().iter().map(|entry| entry.id()).collect();
    assert_eq!(remaining, ids[2..].to_vec());
    Ok(())
}

#[test]
fn test_auto_cleanup_disabled_keeps_everything() -> Result<()> {
    let config = DatabaseConfig::in_memory()
        .with_max_entries_per_test(1)
        .with_auto_cleanup(false);
    let db = CounterexampleDatabase::new(config)?;
    for n in 0..4 {
        db.store_typed("T", "p", &n, "e", Metadata::new())?;
    }
    assert_eq!(db.len(), 4);

    assert_eq!(db.run_maintenance(), 3);
    assert_eq!(db.len(), 1);
    Ok(())
}

#[test]
fn test_unknown_algorithm_decompresses_to_none() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    db.store("T", "p", b"value", "e", Metadata::new())?;

    let mut entry = db.get_latest("T").unwrap();
    entry.compression_algorithm = "brotli".to_string();
    assert_eq!(db.decompress(&entry), None);
    assert_eq!(db.decompress_typed::<String>(&entry), None);
    Ok(())
}

#[test]
fn test_corrupted_data_decompresses_to_none() -> Result<()> {
    let config = DatabaseConfig::in_memory().with_default_compression("gzip");
    let db = CounterexampleDatabase::new(config)?;
    db.store("T", "p", b"value value value", "e", Metadata::new())?;

    let mut entry = db.get_latest("T").unwrap();
    entry.compressed_data.truncate(4);
    assert_eq!(db.decompress(&entry), None);
    Ok(())
}

#[test]
fn test_set_default_compression_rejects_unknown() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    let before = db.default_compression();

    let err = db.set_default_compression("brotli").unwrap_err();
    assert!(err.to_string().contains("brotli"));
    assert_eq!(db.default_compression(), before);

    db.set_default_compression("gzip")?;
    assert_eq!(db.default_compression(), "gzip");
    Ok(())
}

#[test]
fn test_queries_and_clear() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    db.store("parse", "roundtrip", b"a", "e", Metadata::new())?;
    db.store("parse", "bounds", b"b", "e", Metadata::new())?;
    db.store("render", "roundtrip", b"c", "e", Metadata::new())?;

    assert_eq!(db.get_by_test("parse").len(), 2);
    assert_eq!(db.get_by_property("roundtrip").len(), 2);
    assert!(db.get_latest("missing").is_none());

    assert_eq!(db.clear_test("parse"), 2);
    assert_eq!(db.get_all().len(), 1);
    assert_eq!(db.clear(), 1);
    assert!(db.is_empty());
    Ok(())
}

#[test]
fn test_vacuum_groups_by_test() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    for test in ["b", "a", "b", "a"] {
        db.store(test, "p", test.as_bytes(), "e", Metadata::new())?;
    }
    let before: Vec<_> = db.get_all().iter().map(|entry| entry.id()).collect();

    db.vacuum();

    let after = db.get_all();
    let names: Vec<_> = after.iter().map(|entry| entry.test_name.as_str()).collect();
    assert_eq!(names, vec!["a", "a", "b", "b"]);
    let mut ids: Vec<_> = after.iter().map(|entry| entry.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, before);
    Ok(())
}

#[test]
fn test_metadata_is_kept() -> Result<()> {
    let db = CounterexampleDatabase::new(DatabaseConfig::in_memory())?;
    let metadata = Metadata::from([
        ("seed".to_string(), "42".to_string()),
        ("file".to_string(), "plan.dxf".to_string()),
    ]);
    db.store("T", "p", b"x", "e", metadata.clone())?;
    assert_eq!(db.get_latest("T").unwrap().metadata, metadata);
    Ok(())
}

#[test]
fn test_store_runs_retention_cleanup() -> Result<()> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("old.pbtc");
    let expired = CounterexampleEntry::new(
        "T",
        "p",
        b"stale".to_vec(),
        "none",
        5,
        "old failure",
        Utc::now() - Duration::days(40),
    );
    format::write_file(&path, &[expired])?;

    let config = DatabaseConfig::in_memory().with_retention_hours(24 * 30);
    let db = CounterexampleDatabase::new(config)?;
    assert_eq!(db.import_from_file(&path)?, 1);
    assert_eq!(db.len(), 1);

    let id = db.store("T", "p", b"fresh", "new failure", Metadata::new())?;
    let entries = db.get_all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id(), id);
    assert_eq!(entries[0].error_message, "new failure");
    Ok(())
}
