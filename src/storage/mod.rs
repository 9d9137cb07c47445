//! Storage module for persisting harvested records
//!
//! Everything for a source lives under `{data_dir}/{source_slug}/`:
//! - `raw.jsonl`: the append-only record store, one JSON record per line
//! - `index.json`: date/source/category/id lookups into the store
//! - `metadata.json`: counts, date range and the crawl watermark
//!
//! The record store is the only source of truth. The index and metadata
//! files are derived from it and can be rebuilt at any time.

mod error;
mod index;
mod metadata;
mod record_store;

pub use error::{IndexError, IndexResult, StorageError, StorageResult};
pub use index::{IdEntry, IndexManager, RecordIndex, INDEX_FILE};
pub use metadata::{CrawlMetadata, WatermarkLimit, METADATA_FILE};
pub use record_store::{Position, RecordStore, RecordStream, StoredRecord, RECORD_FILE};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Writes a JSON document through a temporary file and a rename
///
/// Readers either see the previous document or the new one, never a
/// partially written file.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a JSON document, returning `None` when it is missing or unreadable
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let mut doc = BTreeMap::new();
        doc.insert("a".to_string(), 1u32);
        write_json_atomic(&path, &doc).unwrap();

        let back: BTreeMap<String, u32> = read_json(&path).unwrap();
        assert_eq!(back, doc);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_read_json_missing_or_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        assert!(read_json::<BTreeMap<String, u32>>(&path).is_none());

        fs::write(&path, b"{not json").unwrap();
        assert!(read_json::<BTreeMap<String, u32>>(&path).is_none());
    }
}
