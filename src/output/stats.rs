//! Run summaries and store statistics
//!
//! This module provides functionality for displaying what a crawl run did
//! and what each source's store, index and metadata currently hold.

use crate::crawler::RunSummary;
use crate::output::OutputResult;
use crate::record::Source;
use crate::storage::{CrawlMetadata, IndexManager, RecordStore};
use chrono::{DateTime, Utc};

/// What one source's files currently hold
#[derive(Debug, Clone)]
pub struct SourceStatistics {
    pub source: Source,

    /// Physical lines in the record file
    pub lines: u64,

    /// Lines that parse as valid records
    pub valid_records: u64,

    /// Records visible after newer versions replace older ones
    pub current_records: u64,

    /// Distinct ids in the index
    pub indexed_ids: usize,

    /// Distinct date keys in the index
    pub dates: usize,

    /// Category keys in the index, both levels
    pub categories: usize,

    pub metadata: CrawlMetadata,
}

impl SourceStatistics {
    /// Lines that could not be read back
    pub fn corrupt_lines(&self) -> u64 {
        self.lines.saturating_sub(self.valid_records)
    }
}

/// Loads statistics for one source
///
/// # Arguments
///
/// * `index` - Index manager for the data directory
/// * `store` - The record store
/// * `source` - Which source to describe
///
/// # Returns
///
/// * `Ok(SourceStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - The record file could not be read
pub fn load_source_statistics(
    index: &IndexManager,
    store: &RecordStore,
    source: Source,
) -> OutputResult<SourceStatistics> {
    let lines = store.line_count(source)?;
    let valid_records = store.count(source)?;
    let current_records = store.current_records(source)?.len() as u64;

    let record_index = index.load_index(source);

    Ok(SourceStatistics {
        source,
        lines,
        valid_records,
        current_records,
        indexed_ids: record_index.by_id.len(),
        dates: record_index.by_date.len(),
        categories: record_index.by_category.len(),
        metadata: index.load_metadata(source),
    })
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Prints one source's statistics to stdout
pub fn print_source_statistics(stats: &SourceStatistics) {
    println!("=== {} ({}) ===\n", stats.source.display_name(), stats.source.slug());

    println!("Store:");
    println!("  Lines: {}", stats.lines);
    println!("  Valid records: {}", stats.valid_records);
    println!("  Current records: {}", stats.current_records);
    if stats.corrupt_lines() > 0 {
        println!("  Unreadable lines: {}", stats.corrupt_lines());
    }
    println!();

    println!("Index:");
    println!("  Ids: {}", stats.indexed_ids);
    println!("  Dates: {}", stats.dates);
    println!("  Category keys: {}", stats.categories);
    println!();

    let metadata = &stats.metadata;
    println!("Metadata:");
    println!("  Total count: {}", metadata.total_count);
    println!(
        "  Updated range: {} .. {}",
        metadata
            .earliest_updated
            .map_or_else(|| "-".to_string(), |d| d.to_string()),
        metadata
            .latest_updated
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    println!(
        "  Watermark: {}",
        metadata
            .watermark()
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    println!("  Last id: {}", metadata.last_id.as_deref().unwrap_or("-"));
    println!("  Last crawl: {}", format_time(metadata.last_crawl_completed_at));
    println!("  Last index build: {}", format_time(metadata.last_index_build));
    println!();
}

/// Prints a finished run to stdout
pub fn print_run_summary(summary: &RunSummary) {
    let stats = &summary.stats;
    let duration = (summary.finished_at - summary.started_at).num_seconds();

    println!(
        "=== {} crawl of {}{} ===\n",
        summary.mode,
        summary.source.display_name(),
        if summary.dry_run { " (dry run)" } else { "" }
    );

    println!("Run:");
    println!(
        "  Cutoff: {}",
        summary
            .cutoff
            .map_or_else(|| "none".to_string(), |d| d.to_string())
    );
    println!("  Duration: {} seconds", duration);
    println!("  List pages: {} ({} failed)", stats.list_pages, stats.list_failures);
    println!();

    println!("Items:");
    println!("  Discovered: {}", stats.discovered);
    println!("  Skipped by cutoff: {}", stats.skipped_by_cutoff);
    println!("  Repeated in run: {}", stats.in_run_duplicates);
    println!("  Fetched: {}", stats.fetched);
    println!("  Parsed: {}", stats.parsed);
    println!("  Duplicates: {}", stats.duplicates);
    println!("  Appended: {}", stats.appended);
    println!();

    println!("Failures:");
    println!("  Network: {}", stats.network_failures);
    println!("  Parse: {}", stats.parse_failures);
    println!("  Parse warnings: {}", stats.parse_warnings);
    println!(
        "  Requests: {} attempts, {} failed, {} rate limited",
        stats.requests.attempts, stats.requests.failures, stats.requests.rate_limited
    );
    println!();

    if let Some(rate) = stats.success_rate() {
        println!("Success rate: {:.1}%", rate * 100.0);
    }
    if summary.degraded {
        println!("WARNING: run is degraded");
    }
    if let Some(metadata) = &summary.metadata {
        println!(
            "Watermark: {}",
            metadata
                .watermark()
                .map_or_else(|| "none".to_string(), |d| d.to_string())
        );
    }
    println!();
}
