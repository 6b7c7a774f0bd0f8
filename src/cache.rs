//! On-disk cache for parsed event tables
//!
//! Parsing large event files is slow enough to cache. A cache record stores
//! the parsed table next to a SHA-512 hash of the raw source bytes; the
//! record is valid only while the stored hash matches the current file. A
//! missing, unreadable, or stale record is a cache-miss condition for the
//! caller to recover from, never something served silently.

use crate::error::{Error, Result};
use crate::table::{read_events, EventTable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct CacheRecord {
    hash: String,
    table: EventTable,
}

/// SHA-512 hash of a file's raw bytes, as lowercase hex
pub fn file_hash(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Where the cache record for `source` lives inside `cache_dir`
pub fn cache_location(source: &Path, cache_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("events");
    cache_dir.join(format!(".{}.cache", stem))
}

/// Write a cache record for a freshly parsed table
pub fn write_cache(table: &EventTable, source: &Path, cache_dir: &Path) -> Result<()> {
    fs::create_dir_all(cache_dir)?;

    let record = CacheRecord {
        hash: file_hash(source)?,
        table: table.clone(),
    };
    let bytes =
        bincode::serialize(&record).map_err(|e| Error::Cache(e.to_string()))?;

    let location = cache_location(source, cache_dir);
    fs::write(&location, bytes)?;

    debug!(cache = %location.display(), "cache written");
    Ok(())
}

/// Read the cache record for `source`, validating its hash
///
/// Any reason the cache cannot serve the current file contents comes back
/// as [`Error::CacheMiss`].
pub fn read_cache(source: &Path, cache_dir: &Path) -> Result<EventTable> {
    let location = cache_location(source, cache_dir);

    let bytes = fs::read(&location)
        .map_err(|_| Error::CacheMiss(format!("no cache at {}", location.display())))?;
    let record: CacheRecord = bincode::deserialize(&bytes)
        .map_err(|_| Error::CacheMiss("unreadable cache record".to_string()))?;

    if record.hash != file_hash(source)? {
        return Err(Error::CacheMiss("source file hash has changed".to_string()));
    }

    debug!(cache = %location.display(), "cache hit");
    Ok(record.table)
}

/// Load an event file, going through the cache
///
/// On a cache miss the source is re-parsed and the cache refreshed
/// (best-effort); anything other than a miss propagates.
pub fn load_events(source: &Path, cache_dir: &Path) -> Result<EventTable> {
    match read_cache(source, cache_dir) {
        Ok(table) => Ok(table),
        Err(e) if e.is_cache_miss() => {
            debug!(source = %source.display(), reason = %e, "re-parsing source");
            let table = read_events(source)?;
            if let Err(e) = write_cache(&table, source, cache_dir) {
                warn!(error = %e, "could not refresh cache");
            }
            Ok(table)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::write_events;

    fn sample_table() -> EventTable {
        let mut table = EventTable::new(vec!["mass".to_string()]).unwrap();
        table.push_row(&[1.5]).unwrap();
        table.push_row(&[2.5]).unwrap();
        table
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("events.csv");
        let cache_dir = dir.path().join("cache");

        let table = sample_table();
        write_events(&source, &table).unwrap();
        write_cache(&table, &source, &cache_dir).unwrap();

        assert_eq!(read_cache(&source, &cache_dir).unwrap(), table);
    }

    #[test]
    fn test_missing_cache_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("events.csv");
        write_events(&source, &sample_table()).unwrap();

        let err = read_cache(&source, dir.path()).unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[test]
    fn test_changed_source_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("events.csv");
        let cache_dir = dir.path().join("cache");

        let table = sample_table();
        write_events(&source, &table).unwrap();
        write_cache(&table, &source, &cache_dir).unwrap();

        // Append an event behind the cache's back.
        let mut grown = table.clone();
        grown.push_row(&[9.0]).unwrap();
        write_events(&source, &grown).unwrap();

        let err = read_cache(&source, &cache_dir).unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[test]
    fn test_load_events_falls_back_and_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("events.csv");
        let cache_dir = dir.path().join("cache");

        let table = sample_table();
        write_events(&source, &table).unwrap();

        // No cache yet: falls back to parsing and writes one.
        assert_eq!(load_events(&source, &cache_dir).unwrap(), table);
        assert!(cache_location(&source, &cache_dir).exists());

        // Second load is served by the cache.
        assert_eq!(load_events(&source, &cache_dir).unwrap(), table);
    }

    #[test]
    fn test_cache_location_joins_properly() {
        let location = cache_location(Path::new("/data/run7.csv"), Path::new("/tmp/cache"));
        assert_eq!(location, Path::new("/tmp/cache/.run7.cache"));
    }

    #[test]
    fn test_file_hash_is_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, b"mass\n1.0\n").unwrap();
        fs::write(&b, b"mass\n1.0\n").unwrap();

        assert_eq!(file_hash(&a).unwrap(), file_hash(&b).unwrap());

        fs::write(&b, b"mass\n2.0\n").unwrap();
        assert_ne!(file_hash(&a).unwrap(), file_hash(&b).unwrap());
    }
}
