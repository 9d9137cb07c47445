//! Index manager
//!
//! Maintains `index.json` and `metadata.json` for each source. The index maps
//! dates, the source, categories and ids to record positions so lookups do not
//! scan the store. It is updated incrementally after each appended batch and
//! can always be rebuilt from the store; both paths produce the same document.

use super::error::{IndexError, IndexResult};
use super::metadata::{CrawlMetadata, WatermarkLimit, METADATA_FILE};
use super::record_store::{Position, RecordStore, StoredRecord};
use super::{read_json, write_json_atomic};
use crate::record::{is_newer, Record, Source, UNKNOWN_DATE_KEY};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// File name of a source's index document
pub const INDEX_FILE: &str = "index.json";

const INDEX_VERSION: u32 = 2;

/// Where the current version of a record lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdEntry {
    pub position: Position,
    /// Effective date the record is filed under
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// The persisted index of one source
///
/// Position lists are kept in append order and only reference the current
/// version of each record. A later append of an id replaces the indexed one
/// unless the indexed version has a strictly newer `updated_date`, the same
/// rule [`RecordStore::current_records`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIndex {
    pub version: u32,
    /// Line number of the last indexed record
    pub indexed_lines: u64,
    /// Store size in bytes when the index was last brought up to date
    pub indexed_bytes: u64,
    pub by_date: BTreeMap<String, Vec<Position>>,
    pub by_source: BTreeMap<String, Vec<Position>>,
    pub by_category: BTreeMap<String, Vec<Position>>,
    pub by_id: BTreeMap<String, IdEntry>,
}

impl Default for RecordIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            indexed_lines: 0,
            indexed_bytes: 0,
            by_date: BTreeMap::new(),
            by_source: BTreeMap::new(),
            by_category: BTreeMap::new(),
            by_id: BTreeMap::new(),
        }
    }
}

impl RecordIndex {
    /// Files one stored record under every key it belongs to
    pub fn insert(&mut self, stored: &StoredRecord) {
        let record = &stored.record;
        let position = stored.position;
        self.indexed_lines = self.indexed_lines.max(position.line);

        if let Some(current) = self.by_id.get(record.id()) {
            if is_newer(current.updated, record.updated_date()) {
                return;
            }
        }

        if let Some(previous) = self.by_id.remove(record.id()) {
            remove_position(&mut self.by_date, &index_date_key(previous.date), previous.position);
            remove_position(&mut self.by_source, record.source().slug(), previous.position);
            for key in &previous.categories {
                remove_position(&mut self.by_category, key, previous.position);
            }
        }

        let date = record.effective_date();
        let categories = record.category_keys();

        self.by_date
            .entry(index_date_key(date))
            .or_default()
            .push(position);
        self.by_source
            .entry(record.source().slug().to_string())
            .or_default()
            .push(position);
        for key in &categories {
            self.by_category.entry(key.clone()).or_default().push(position);
        }
        self.by_id.insert(
            record.id().to_string(),
            IdEntry {
                position,
                date,
                updated: record.updated_date(),
                categories,
            },
        );
    }

    /// Number of distinct records indexed
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn index_date_key(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => UNKNOWN_DATE_KEY.to_string(),
    }
}

fn remove_position(map: &mut BTreeMap<String, Vec<Position>>, key: &str, position: Position) {
    if let Some(positions) = map.get_mut(key) {
        positions.retain(|p| *p != position);
        if positions.is_empty() {
            map.remove(key);
        }
    }
}

/// Maintains the index and metadata documents next to each record store
#[derive(Debug, Clone)]
pub struct IndexManager {
    store: RecordStore,
}

impl IndexManager {
    /// Creates a manager reading from the same data directory as `store`
    pub fn new(store: &RecordStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    pub fn index_path(&self, source: Source) -> PathBuf {
        self.store.source_dir(source).join(INDEX_FILE)
    }

    pub fn metadata_path(&self, source: Source) -> PathBuf {
        self.store.source_dir(source).join(METADATA_FILE)
    }

    /// Loads the persisted index, or an empty one if it is missing or unreadable
    pub fn load_index(&self, source: Source) -> RecordIndex {
        read_json::<RecordIndex>(&self.index_path(source))
            .filter(|index| index.version == INDEX_VERSION)
            .unwrap_or_default()
    }

    /// Folds newly appended records into the index
    ///
    /// The batch must directly follow what the index already covers. If it
    /// does not (a previous update was lost, or the index is missing), the
    /// index is rebuilt from the store instead.
    ///
    /// # Arguments
    ///
    /// * `source` - The source whose index to update
    /// * `new_records` - Records appended since the last update, in append order
    ///
    /// # Returns
    ///
    /// * `Ok(RecordIndex)` - The index as persisted
    /// * `Err(IndexError)` - The index could not be written
    pub fn update_index(
        &self,
        source: Source,
        new_records: &[StoredRecord],
    ) -> IndexResult<RecordIndex> {
        let mut index = self.load_index(source);

        let Some(first) = new_records.first() else {
            return Ok(index);
        };

        if first.position.offset != index.indexed_bytes {
            info!(
                "Index for {} covers {} bytes but the batch starts at {}, rebuilding",
                source, index.indexed_bytes, first.position.offset
            );
            return self.rebuild_index(source);
        }

        for stored in new_records {
            index.insert(stored);
        }
        index.indexed_bytes = self.store.byte_len(source)?;

        write_json_atomic(&self.index_path(source), &index)?;
        debug!(
            "Indexed {} new records for {} ({} total)",
            new_records.len(),
            source,
            index.len()
        );
        Ok(index)
    }

    /// Rebuilds the index from scratch by streaming the store
    pub fn rebuild_index(&self, source: Source) -> IndexResult<RecordIndex> {
        let mut index = RecordIndex::default();
        for stored in self.store.stream_positioned(source)? {
            index.insert(&stored);
        }
        index.indexed_bytes = self.store.byte_len(source)?;

        write_json_atomic(&self.index_path(source), &index)?;

        let previous = self.load_metadata(source);
        let mut metadata = self.summarize(source, previous.clone())?;
        metadata.last_index_build = previous.last_index_build.max(Some(Utc::now()));
        write_json_atomic(&self.metadata_path(source), &metadata)?;

        info!(
            "Rebuilt index for {}: {} records over {} lines",
            source,
            index.len(),
            index.indexed_lines
        );
        Ok(index)
    }

    /// Checks that the index does not reference data past the end of the store
    pub fn verify(&self, source: Source, index: &RecordIndex) -> IndexResult<()> {
        let actual = self.store.byte_len(source)?;
        if index.indexed_bytes > actual {
            return Err(IndexError::Inconsistent {
                origin: source,
                indexed: index.indexed_bytes,
                actual,
            });
        }
        Ok(())
    }

    /// Positions of the records whose effective date is `date`, in append order
    pub fn query_by_date(&self, source: Source, date: NaiveDate) -> IndexResult<Vec<Position>> {
        let index = self.current_index(source)?;
        Ok(index
            .by_date
            .get(&index_date_key(Some(date)))
            .cloned()
            .unwrap_or_default())
    }

    /// Positions of the records filed under `category`
    ///
    /// Accepts either a top-level category or a `category > subcategory` path.
    pub fn query_by_category(&self, source: Source, category: &str) -> IndexResult<Vec<Position>> {
        let index = self.current_index(source)?;
        Ok(index
            .by_category
            .get(category.trim())
            .cloned()
            .unwrap_or_default())
    }

    /// Position of the current version of a record
    pub fn query_by_id(&self, source: Source, id: &str) -> IndexResult<Option<Position>> {
        let index = self.current_index(source)?;
        Ok(index.by_id.get(id).map(|entry| entry.position))
    }

    /// Loads the metadata document, or empty metadata if it is missing or unreadable
    pub fn load_metadata(&self, source: Source) -> CrawlMetadata {
        read_json::<CrawlMetadata>(&self.metadata_path(source))
            .filter(|meta| meta.source == source)
            .unwrap_or_else(|| CrawlMetadata::empty(source))
    }

    /// Recomputes and persists metadata
    ///
    /// Counts and the date range come from the store; the crawl watermark is
    /// taken from `metadata` as given. Timestamps never move backwards:
    /// `last_crawl_completed_at` is the latest of the stored value, the
    /// caller's value and now.
    pub fn save_metadata(
        &self,
        source: Source,
        metadata: &CrawlMetadata,
    ) -> IndexResult<CrawlMetadata> {
        let previous = self.load_metadata(source);

        let mut merged = metadata.clone();
        merged.source = source;
        merged.created_at = previous.created_at.min(metadata.created_at);
        merged.last_index_build = previous.last_index_build.max(metadata.last_index_build);

        let mut saved = self.summarize(source, merged)?;
        saved.last_crawl_completed_at = previous
            .last_crawl_completed_at
            .max(metadata.last_crawl_completed_at)
            .max(Some(Utc::now()));

        write_json_atomic(&self.metadata_path(source), &saved)?;
        debug!(
            "Saved metadata for {}: {} records, watermark {:?}",
            source, saved.total_count, saved.crawl_watermark
        );
        Ok(saved)
    }

    /// Persists metadata at the end of a crawl and moves the watermark
    ///
    /// The watermark moves toward the newest date in the store, but not past
    /// anything `limit` says the run failed to capture.
    ///
    /// # Arguments
    ///
    /// * `source` - The crawled source
    /// * `metadata` - Metadata as loaded when the run started
    /// * `limit` - Failures seen during the run
    pub fn complete_crawl(
        &self,
        source: Source,
        metadata: &CrawlMetadata,
        limit: WatermarkLimit,
    ) -> IndexResult<CrawlMetadata> {
        let mut finished = self.summarize(source, metadata.clone())?;
        finished.crawl_watermark = limit.apply(metadata.crawl_watermark, finished.latest_updated);
        self.save_metadata(source, &finished)
    }

    /// Index that reflects the whole store, rebuilding when it lags or overshoots
    fn current_index(&self, source: Source) -> IndexResult<RecordIndex> {
        let index = self.load_index(source);

        match self.verify(source, &index) {
            Ok(()) => {}
            Err(IndexError::Inconsistent {
                indexed, actual, ..
            }) => {
                warn!(
                    "Index for {} covers {} bytes but the store holds {}, rebuilding",
                    source, indexed, actual
                );
                return self.rebuild_index(source);
            }
            Err(e) => return Err(e),
        }

        if index.indexed_bytes < self.store.byte_len(source)? {
            info!("Index for {} is behind the store, rebuilding", source);
            return self.rebuild_index(source);
        }

        Ok(index)
    }

    /// Fills count, date range and last id from the store
    fn summarize(&self, source: Source, mut metadata: CrawlMetadata) -> IndexResult<CrawlMetadata> {
        let mut dates: HashMap<String, Option<NaiveDate>> = HashMap::new();
        let mut last: Option<Record> = None;

        for record in self.store.stream_read(source)? {
            let date = record.effective_date();
            let slot = dates.entry(record.id().to_string()).or_insert(date);
            if date > *slot {
                *slot = date;
            }
            last = Some(record);
        }

        metadata.total_count = dates.len() as u64;
        metadata.earliest_updated = None;
        metadata.latest_updated = None;
        for date in dates.values().flatten() {
            metadata.observe_date(*date);
        }
        metadata.last_id = last.map(|r| r.id().to_string());

        Ok(metadata)
    }
}
