//! What the store already knows about a source
//!
//! Loaded once per run by streaming the store. Used to give records stable
//! ids, to decide whether a fetched record is new, and to keep `fetched_at`
//! monotonic across runs.

use crate::record::{parse_record_id, record_id, Record, RecordDraft, Source};
use crate::storage::{RecordStore, StorageResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

/// Outcome of comparing a fetched record with the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The id has never been stored
    New,
    /// The record is a newer version of a stored one
    Supersedes,
    /// The store already has this version or a newer one
    Duplicate,
}

#[derive(Debug)]
pub struct KnownRecords {
    source: Source,
    /// id -> latest stored `updated_date`
    updated: HashMap<String, Option<NaiveDate>>,
    /// detail URL -> id
    ids_by_url: HashMap<String, String>,
    /// date key -> highest sequence used
    sequences: HashMap<String, u32>,
    last_fetched_at: Option<DateTime<Utc>>,
}

impl KnownRecords {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            updated: HashMap::new(),
            ids_by_url: HashMap::new(),
            sequences: HashMap::new(),
            last_fetched_at: None,
        }
    }

    /// Streams a source's store and remembers every record in it
    pub fn load(store: &RecordStore, source: Source) -> StorageResult<Self> {
        let mut known = Self::new(source);
        for record in store.stream_read(source)? {
            known.observe(&record);
        }
        Ok(known)
    }

    /// Remembers a record that is now in the store
    pub fn observe(&mut self, record: &Record) {
        let slot = self
            .updated
            .entry(record.id().to_string())
            .or_insert(record.updated_date());
        if record.updated_date() > *slot {
            *slot = record.updated_date();
        }

        if !record.source_url().is_empty() {
            self.ids_by_url
                .insert(record.source_url().to_string(), record.id().to_string());
        }

        if let Some((date_key, sequence)) = parse_record_id(record.id()) {
            let highest = self.sequences.entry(date_key.to_string()).or_insert(0);
            *highest = (*highest).max(sequence);
        }

        self.last_fetched_at = self.last_fetched_at.max(Some(record.fetched_at()));
    }

    /// The id a draft should be stored under
    ///
    /// A detail URL seen before keeps its id. Otherwise the id takes the next
    /// free sequence number for the draft's date. Nothing is reserved until
    /// the record is [`observe`](Self::observe)d.
    pub fn assign_id(&self, draft: &RecordDraft) -> String {
        if let Some(id) = self.ids_by_url.get(&draft.source_url) {
            return id.clone();
        }

        let date_key = draft.date_key();
        let next = self.sequences.get(&date_key).copied().unwrap_or(0) + 1;
        record_id(self.source, &date_key, next)
    }

    /// Compares a fetched record with what is stored under its id
    pub fn admit(&self, record: &Record) -> Admission {
        match self.updated.get(record.id()) {
            None => Admission::New,
            Some(stored) if record.supersedes(*stored) => Admission::Supersedes,
            Some(_) => Admission::Duplicate,
        }
    }

    /// A fetch timestamp no earlier than anything already stored
    pub fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_fetched_at {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    /// Number of distinct ids known
    pub fn len(&self) -> usize {
        self.updated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }
}
