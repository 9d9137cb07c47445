//! Append-only JSON Lines record store
//!
//! Each source has one `raw.jsonl` file. Records are only ever appended,
//! each as a single newline-terminated line written with one `write_all`.
//! Readers treat an unterminated final line as an interrupted append and
//! ignore it. The next append truncates it away before writing.
//!
//! A store assumes it is the only writer of its files.

use super::error::{StorageError, StorageResult};
use crate::record::{Record, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// File name of a source's record store
pub const RECORD_FILE: &str = "raw.jsonl";

/// How many bytes `last_record` reads from the end before widening
const TAIL_WINDOW: u64 = 64 * 1024;

/// Where a record lives in its store
///
/// `line` is the 1-based physical line number and `offset` the byte offset
/// of the line's first byte.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u64,
    pub offset: u64,
}

/// A record together with its position in the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub position: Position,
    pub record: Record,
}

/// Cached end-of-file state for one source
#[derive(Debug, Clone, Copy, Default)]
struct Tail {
    lines: u64,
    bytes: u64,
    last_fetched_at: Option<DateTime<Utc>>,
}

/// Per-source JSONL record store rooted at the data directory
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    sync_writes: bool,
    tails: HashMap<Source, Tail>,
}

impl RecordStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    ///
    /// # Arguments
    ///
    /// * `root` - The data directory holding one sub-directory per source
    ///
    /// # Returns
    ///
    /// * `Ok(RecordStore)` - The directory exists and is usable
    /// * `Err(StorageError)` - The directory could not be created
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            sync_writes: true,
            tails: HashMap::new(),
        })
    }

    /// Whether each append is flushed to disk before returning
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self, source: Source) -> PathBuf {
        self.root.join(source.slug())
    }

    pub fn record_path(&self, source: Source) -> PathBuf {
        self.source_dir(source).join(RECORD_FILE)
    }

    /// Appends one record to its source's store
    ///
    /// Fails without writing if the record's `fetched_at` is older than the
    /// last stored record of the same source.
    pub fn append(&mut self, record: &Record) -> StorageResult<Position> {
        let source = record.source();
        let tail = self.tail(source)?;

        if let Some(last) = tail.last_fetched_at {
            if record.fetched_at() < last {
                return Err(StorageError::NonMonotonicFetch {
                    id: record.id().to_string(),
                    fetched_at: record.fetched_at(),
                    last,
                });
            }
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.record_path(source);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(&line)?;
                if self.sync_writes {
                    file.sync_data()?;
                }
                Ok(())
            });

        if let Err(e) = written {
            // Force a rescan (and tail repair) before the next append
            self.tails.remove(&source);
            return Err(e.into());
        }

        let position = Position {
            line: tail.lines + 1,
            offset: tail.bytes,
        };
        self.tails.insert(
            source,
            Tail {
                lines: position.line,
                bytes: tail.bytes + line.len() as u64,
                last_fetched_at: Some(record.fetched_at()),
            },
        );

        debug!(
            "Appended {} at line {} (offset {})",
            record.id(),
            position.line,
            position.offset
        );
        Ok(position)
    }

    /// Streams records in append order without loading the whole file
    pub fn stream_read(&self, source: Source) -> StorageResult<impl Iterator<Item = Record>> {
        Ok(self.stream_positioned(source)?.map(|stored| stored.record))
    }

    /// Streams records in append order along with their positions
    ///
    /// Blank lines, lines that fail to parse or validate, and an unterminated
    /// final line are skipped with a warning.
    pub fn stream_positioned(&self, source: Source) -> StorageResult<RecordStream> {
        let path = self.record_path(source);
        let reader = match File::open(&path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(RecordStream {
            reader,
            path,
            line: 0,
            offset: 0,
            buf: Vec::new(),
            skipped: 0,
        })
    }

    /// Reads every record into memory
    pub fn read_all(&self, source: Source) -> StorageResult<Vec<Record>> {
        Ok(self.stream_read(source)?.collect())
    }

    /// Returns the most recently appended valid record
    ///
    /// Reads backwards from the end of the file, so the cost does not grow
    /// with the size of the store.
    pub fn last_record(&self, source: Source) -> StorageResult<Option<Record>> {
        let path = self.record_path(source);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(None);
        }

        let mut window = TAIL_WINDOW.min(len);
        loop {
            let start = len - window;
            file.seek(SeekFrom::Start(start))?;
            let mut buf = vec![0u8; window as usize];
            file.read_exact(&mut buf)?;

            if let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') {
                let complete = &buf[..=last_newline];
                let segments: Vec<&[u8]> = complete.split(|b| *b == b'\n').collect();

                for (i, segment) in segments.iter().enumerate().rev() {
                    // The first segment may start mid-line unless we read from 0
                    if i == 0 && start > 0 {
                        break;
                    }
                    let text = trim_line(segment);
                    if text.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<Record>(text) {
                        Ok(record) => return Ok(Some(record)),
                        Err(e) => warn!("Skipping corrupt record near end of {}: {}", path.display(), e),
                    }
                }
            }

            if start == 0 {
                return Ok(None);
            }
            window = (window * 2).min(len);
        }
    }

    /// Reads the record at a known position
    ///
    /// Returns `Ok(None)` if the position is past the end of the store or
    /// points at a blank or unterminated line.
    pub fn read_at(&self, source: Source, position: Position) -> StorageResult<Option<Record>> {
        let mut file = match File::open(self.record_path(source)) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if position.offset >= file.metadata()?.len() {
            return Ok(None);
        }
        file.seek(SeekFrom::Start(position.offset))?;

        let mut buf = Vec::new();
        BufReader::new(file).read_until(b'\n', &mut buf)?;
        if buf.last() != Some(&b'\n') {
            return Ok(None);
        }

        let text = trim_line(&buf);
        if text.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(text)
            .map(Some)
            .map_err(|e| StorageError::CorruptRecord {
                line: position.line,
                reason: e.to_string(),
            })
    }

    /// Number of valid records in the store
    pub fn count(&self, source: Source) -> StorageResult<u64> {
        Ok(self.stream_positioned(source)?.count() as u64)
    }

    /// Number of newline-terminated lines, valid or not
    pub fn line_count(&self, source: Source) -> StorageResult<u64> {
        let file = match File::open(self.record_path(source)) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut lines = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            if buf.last() == Some(&b'\n') {
                lines += 1;
            }
        }
        Ok(lines)
    }

    /// Size of the store file in bytes (0 if it does not exist)
    pub fn byte_len(&self, source: Source) -> StorageResult<u64> {
        match fs::metadata(self.record_path(source)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// The current version of every record, in order of first appearance
    ///
    /// When an id appears more than once, the later line wins unless the
    /// earlier one carries a strictly newer `updated_date`.
    pub fn current_records(&self, source: Source) -> StorageResult<Vec<Record>> {
        let mut records: Vec<Record> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for stored in self.stream_positioned(source)? {
            let record = stored.record;
            match slots.get(record.id()) {
                Some(&slot) => {
                    if !records[slot].supersedes(record.updated_date()) {
                        records[slot] = record;
                    }
                }
                None => {
                    slots.insert(record.id().to_string(), records.len());
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    fn tail(&mut self, source: Source) -> StorageResult<Tail> {
        if let Some(tail) = self.tails.get(&source) {
            return Ok(*tail);
        }

        let tail = self.scan_tail(source)?;
        self.tails.insert(source, tail);
        Ok(tail)
    }

    /// Counts complete lines and truncates an interrupted final append
    fn scan_tail(&self, source: Source) -> StorageResult<Tail> {
        let path = self.record_path(source);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Tail::default()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut lines = 0u64;
        let mut complete = 0u64;
        let mut total = 0u64;

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            total += read as u64;
            if buf.last() == Some(&b'\n') {
                lines += 1;
                complete = total;
            }
        }

        if complete < total {
            warn!(
                "Truncating {} unterminated bytes at end of {}",
                total - complete,
                path.display()
            );
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(complete)?;
            if self.sync_writes {
                file.sync_data()?;
            }
        }

        let last_fetched_at = self.last_record(source)?.map(|r| r.fetched_at());

        Ok(Tail {
            lines,
            bytes: complete,
            last_fetched_at,
        })
    }
}

/// Iterator over the valid records of one store file
pub struct RecordStream {
    reader: Option<BufReader<File>>,
    path: PathBuf,
    line: u64,
    offset: u64,
    buf: Vec<u8>,
    skipped: u64,
}

impl RecordStream {
    /// Number of lines skipped so far as corrupt or invalid
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Iterator for RecordStream {
    type Item = StoredRecord;

    fn next(&mut self) -> Option<StoredRecord> {
        loop {
            self.buf.clear();
            let read = match self.reader.as_mut() {
                Some(reader) => reader.read_until(b'\n', &mut self.buf),
                None => return None,
            };

            let read = match read {
                Ok(0) => return None,
                Ok(read) => read,
                Err(e) => {
                    error!("Stopped reading {}: {}", self.path.display(), e);
                    self.reader = None;
                    return None;
                }
            };

            let start = self.offset;
            self.offset += read as u64;

            if self.buf.last() != Some(&b'\n') {
                warn!(
                    "Ignoring unterminated final line in {} (offset {})",
                    self.path.display(),
                    start
                );
                self.reader = None;
                return None;
            }
            self.line += 1;

            let text = trim_line(&self.buf);
            if text.is_empty() {
                continue;
            }

            match serde_json::from_slice::<Record>(text) {
                Ok(record) => {
                    return Some(StoredRecord {
                        position: Position {
                            line: self.line,
                            offset: start,
                        },
                        record,
                    })
                }
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        "Skipping corrupt record at {}:{}: {}",
                        self.path.display(),
                        self.line,
                        e
                    );
                }
            }
        }
    }
}

fn trim_line(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}
