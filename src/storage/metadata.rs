//! Per-source crawl metadata
//!
//! `metadata.json` carries the summary numbers of a store and the crawl
//! watermark that incremental runs compare list dates against.
//!
//! The watermark is not the newest date in the store. It only moves when a
//! crawl finishes, and never past an item that run failed to capture.

use crate::record::Source;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// File name of a source's metadata document
pub const METADATA_FILE: &str = "metadata.json";

/// Summary of one source's store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlMetadata {
    pub source: Source,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub earliest_updated: Option<NaiveDate>,
    #[serde(default)]
    pub latest_updated: Option<NaiveDate>,
    #[serde(default)]
    pub last_id: Option<String>,
    /// Items updated on or before this date are fully captured
    #[serde(default)]
    pub crawl_watermark: Option<NaiveDate>,
    #[serde(default)]
    pub last_crawl_completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_index_build: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CrawlMetadata {
    /// Metadata for a source that has never been crawled
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            total_count: 0,
            earliest_updated: None,
            latest_updated: None,
            last_id: None,
            crawl_watermark: None,
            last_crawl_completed_at: None,
            last_index_build: None,
            created_at: Utc::now(),
        }
    }

    /// The date incremental runs skip items at or before
    pub fn watermark(&self) -> Option<NaiveDate> {
        self.crawl_watermark
    }

    /// Widens the date range to include `date`
    pub(crate) fn observe_date(&mut self, date: NaiveDate) {
        self.earliest_updated = Some(self.earliest_updated.map_or(date, |d| d.min(date)));
        self.latest_updated = Some(self.latest_updated.map_or(date, |d| d.max(date)));
    }
}

/// How far a finished run may move the crawl watermark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatermarkLimit {
    /// Everything the run attempted was captured
    #[default]
    Unbounded,
    /// An item listed with this date was not captured
    Before(NaiveDate),
    /// Something failed whose date is unknown; keep the old watermark
    Hold,
}

impl WatermarkLimit {
    /// Narrows the limit after a failure to capture an item listed with `date`
    ///
    /// A failure without a date (an undated item or a whole list page)
    /// holds the watermark where it was.
    pub fn tighten(&mut self, date: Option<NaiveDate>) {
        *self = match (*self, date) {
            (Self::Hold, _) | (_, None) => Self::Hold,
            (Self::Unbounded, Some(date)) => Self::Before(date),
            (Self::Before(earliest), Some(date)) => Self::Before(earliest.min(date)),
        };
    }

    /// The watermark after a run
    ///
    /// # Arguments
    ///
    /// * `previous` - Watermark the run started from
    /// * `latest` - Newest effective date in the store after the run
    pub fn apply(self, previous: Option<NaiveDate>, latest: Option<NaiveDate>) -> Option<NaiveDate> {
        let captured = previous.max(latest);
        match self {
            Self::Unbounded => captured,
            Self::Before(failed) => match (captured, failed.pred_opt()) {
                (Some(captured), Some(limit)) => Some(captured.min(limit)),
                _ => None,
            },
            Self::Hold => previous,
        }
    }
}
