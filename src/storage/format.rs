//! Binary database / export file format
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header:  magic "PBTC" | u32 version | u32 entry_count
//! entry:   str test_name | str property_name | bytes compressed_data
//!          | str error_message | i64 timestamp_ms | u64 original_size
//!          | u64 compressed_size | str compression_algorithm
//!          | (v2) u32 pair_count, then pair_count x (str key | str value)
//! str/bytes: u32 byte length followed by the bytes
//! ```
//!
//! Version 1 files carry no metadata and are still readable. Any other
//! version, a wrong magic, truncation or trailing bytes rejects the whole
//! file: readers decode everything before handing back a single entry.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::DateTime;
use tempfile::NamedTempFile;

use crate::common::constants::{STORAGE_FORMAT_VERSION, STORAGE_FORMAT_VERSION_V1, STORAGE_MAGIC};
use crate::common::error::{DatabaseError, Result};
use crate::storage::entry::{CounterexampleEntry, Metadata};

/// Writes entries in the current format version
pub fn write_entries<W: Write>(writer: &mut W, entries: &[CounterexampleEntry]) -> Result<()> {
    write_entries_with_version(writer, entries, STORAGE_FORMAT_VERSION)
}

/// Writes entries in an explicit format version (1 drops metadata)
pub fn write_entries_with_version<W: Write>(
    writer: &mut W,
    entries: &[CounterexampleEntry],
    version: u32,
) -> Result<()> {
    if version != STORAGE_FORMAT_VERSION && version != STORAGE_FORMAT_VERSION_V1 {
        return Err(crate::format_err!("Cannot write format version {}", version));
    }

    writer.write_all(STORAGE_MAGIC)?;
    writer.write_u32::<LittleEndian>(version)?;
    writer.write_u32::<LittleEndian>(length_u32(entries.len(), "entry count")?)?;

    for entry in entries {
        write_bytes(writer, entry.test_name.as_bytes())?;
        write_bytes(writer, entry.property_name.as_bytes())?;
        write_bytes(writer, &entry.compressed_data)?;
        write_bytes(writer, entry.error_message.as_bytes())?;
        writer.write_i64::<LittleEndian>(entry.timestamp.timestamp_millis())?;
        writer.write_u64::<LittleEndian>(entry.original_size)?;
        writer.write_u64::<LittleEndian>(entry.compressed_size)?;
        write_bytes(writer, entry.compression_algorithm.as_bytes())?;

        if version >= STORAGE_FORMAT_VERSION {
            writer.write_u32::<LittleEndian>(length_u32(entry.metadata.len(), "metadata count")?)?;
            for (key, value) in &entry.metadata {
                write_bytes(writer, key.as_bytes())?;
                write_bytes(writer, value.as_bytes())?;
            }
        }
    }

    Ok(())
}

/// Reads every entry from a complete file image
pub fn read_entries<R: Read>(reader: &mut R) -> Result<Vec<CounterexampleEntry>> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| truncated(e, "magic"))?;
    if &magic != STORAGE_MAGIC {
        return Err(crate::format_err!(
            "Bad magic {:?}, expected {:?}",
            String::from_utf8_lossy(&magic),
            String::from_utf8_lossy(STORAGE_MAGIC)
        ));
    }

    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(e, "version"))?;
    if version != STORAGE_FORMAT_VERSION && version != STORAGE_FORMAT_VERSION_V1 {
        return Err(crate::format_err!("Unsupported file version {}", version));
    }

    let entry_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(e, "entry count"))?;

    // Capacity is not trusted from the header
    let mut entries = Vec::new();
    for index in 0..entry_count {
        entries.push(read_entry(reader, version).map_err(|e| match e {
            DatabaseError::Format(msg) => {
                crate::format_err!("Entry {} of {}: {}", index, entry_count, msg)
            }
            other => other,
        })?);
    }

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(crate::format_err!(
            "Trailing bytes after {} entries",
            entry_count
        ));
    }

    Ok(entries)
}

/// Reads a database or export file
pub fn read_file(path: &Path) -> Result<Vec<CounterexampleEntry>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_entries(&mut reader)
}

/// Writes a database or export file atomically
///
/// The entries go to a temporary file next to `path` which then replaces
/// `path` in one rename, so readers never observe a half-written file.
pub fn write_file(path: &Path, entries: &[CounterexampleEntry]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write_entries(&mut writer, entries)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| DatabaseError::Io(e.error))?;

    Ok(())
}

fn read_entry<R: Read>(reader: &mut R, version: u32) -> Result<CounterexampleEntry> {
    let test_name = read_string(reader, "test name")?;
    let property_name = read_string(reader, "property name")?;
    let compressed_data = read_bytes(reader, "compressed data")?;
    let error_message = read_string(reader, "error message")?;

    let millis = reader
        .read_i64::<LittleEndian>()
        .map_err(|e| truncated(e, "timestamp"))?;
    let timestamp = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| crate::format_err!("Timestamp {} out of range", millis))?;

    let original_size = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| truncated(e, "original size"))?;
    let compressed_size = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| truncated(e, "compressed size"))?;
    if compressed_size != compressed_data.len() as u64 {
        return Err(crate::format_err!(
            "Compressed size {} does not match {} data bytes",
            compressed_size,
            compressed_data.len()
        ));
    }

    let compression_algorithm = read_string(reader, "compression algorithm")?;

    let mut metadata = Metadata::new();
    if version >= STORAGE_FORMAT_VERSION {
        let pairs = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| truncated(e, "metadata count"))?;
        for _ in 0..pairs {
            let key = read_string(reader, "metadata key")?;
            let value = read_string(reader, "metadata value")?;
            metadata.insert(key, value);
        }
    }

    let entry = CounterexampleEntry::new(
        test_name,
        property_name,
        compressed_data,
        compression_algorithm,
        original_size,
        error_message,
        timestamp,
    );
    Ok(entry.with_metadata(metadata))
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_u32::<LittleEndian>(length_u32(bytes.len(), "field length")?)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_bytes<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| truncated(e, what))?;

    // take() keeps a corrupt length from allocating gigabytes up front
    let mut buffer = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buffer)?;
    if buffer.len() != len as usize {
        return Err(crate::format_err!(
            "Truncated {}: expected {} bytes, found {}",
            what,
            len,
            buffer.len()
        ));
    }
    Ok(buffer)
}

fn read_string<R: Read>(reader: &mut R, what: &str) -> Result<String> {
    let bytes = read_bytes(reader, what)?;
    String::from_utf8(bytes).map_err(|_| crate::format_err!("Invalid UTF-8 in {}", what))
}

fn length_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| crate::format_err!("{} {} exceeds u32", what, len))
}

fn truncated(e: io::Error, what: &str) -> DatabaseError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        crate::format_err!("Truncated {}", what)
    } else {
        DatabaseError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample_entries() -> Vec<CounterexampleEntry> {
        let now = Utc::now();
        vec![
            CounterexampleEntry::new("parse", "roundtrip", vec![1, 2, 3], "none", 3, "boom", now)
                .with_metadata(Metadata::from([
                    ("seed".to_string(), "42".to_string()),
                    ("shrinks".to_string(), "7".to_string()),
                ])),
            CounterexampleEntry::new(
                "render",
                "no_panic",
                Vec::new(),
                "gzip",
                0,
                "é ünïcode",
                now - Duration::days(3),
            ),
        ]
    }

    fn encode(entries: &[CounterexampleEntry], version: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_entries_with_version(&mut bytes, entries, version).unwrap();
        bytes
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&sample_entries(), STORAGE_FORMAT_VERSION);
        assert_eq!(&bytes[0..4], b"PBTC");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
        // First field: length-prefixed test name
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 5);
        assert_eq!(&bytes[16..21], b"parse");
    }

    #[test]
    fn test_roundtrip_current_version() {
        let entries = sample_entries();
        let bytes = encode(&entries, STORAGE_FORMAT_VERSION);
        let decoded = read_entries(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(decoded.len(), entries.len());
        for (a, b) in entries.iter().zip(&decoded) {
            assert!(a.same_record(b));
        }
    }

    #[test]
    fn test_version_one_drops_metadata() {
        let entries = sample_entries();
        let bytes = encode(&entries, STORAGE_FORMAT_VERSION_V1);
        let decoded = read_entries(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].metadata.is_empty());
        assert_eq!(decoded[0].compressed_data, vec![1, 2, 3]);
        assert_eq!(decoded[1].error_message, "é ünïcode");
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let mut bytes = encode(&sample_entries(), STORAGE_FORMAT_VERSION);
        bytes[0] = b'X';
        assert!(read_entries(&mut Cursor::new(&bytes)).unwrap_err().is_format_error());

        let mut bytes = encode(&sample_entries(), STORAGE_FORMAT_VERSION);
        bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
        let err = read_entries(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(err.to_string().contains("Unsupported file version 3"));

        assert!(write_entries_with_version(&mut Vec::new(), &[], 7).is_err());
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let bytes = encode(&sample_entries(), STORAGE_FORMAT_VERSION);

        for cut in [2, 10, 20, bytes.len() - 1] {
            let err = read_entries(&mut Cursor::new(&bytes[..cut])).unwrap_err();
            assert!(err.is_format_error(), "cut at {} gave {}", cut, err);
        }

        let mut padded = bytes.clone();
        padded.push(0);
        assert!(read_entries(&mut Cursor::new(padded)).unwrap_err().is_format_error());
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let mut entries = sample_entries();
        entries[0].compressed_size = 99;
        let bytes = encode(&entries, STORAGE_FORMAT_VERSION);
        let err = read_entries(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_file_roundtrip_is_atomic_replace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db.pbtc");

        write_file(&path, &sample_entries()).unwrap();
        assert_eq!(read_file(&path).unwrap().len(), 2);

        write_file(&path, &[]).unwrap();
        assert!(read_file(&path).unwrap().is_empty());

        // Only the database file remains, no stray temp files
        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
