//! Crawl orchestrator - the shared crawl loop
//!
//! This module drives one run for one source:
//! - Walking the navigation frontier (numbered pages or a category tree)
//! - Skipping items at or before the watermark in incremental mode
//! - Fetching and parsing detail pages through the source strategy
//! - Assigning stable ids and dropping duplicates
//! - Appending new records and updating the index after each list page
//! - Saving metadata at the end, moving the watermark no further than the
//!   earliest item the run failed to capture

use crate::config::{prepare_data_dir, Config};
use crate::crawler::dedup::{Admission, KnownRecords};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::pacer::Pacer;
use crate::crawler::frontier::Frontier;
use crate::crawler::strategy::{Cursor, ListItem, ListPage, PageRequest, SourceStrategy};
use crate::record::Source;
use crate::sources::SiteStrategy;
use crate::state::{CrawlPhase, RunStats};
use crate::storage::{CrawlMetadata, IndexManager, RecordStore, StoredRecord, WatermarkLimit};
use crate::{ConfigError, HarvestError};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::fmt;
use tracing::{debug, info, warn};

/// Whether a run honors the watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Fetch every item regardless of date
    Full,
    /// Skip items dated at or before the stored watermark
    Incremental,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlMode::Full => write!(f, "full"),
            CrawlMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: Source,
    pub mode: CrawlMode,
    pub dry_run: bool,
    pub cutoff: Option<NaiveDate>,
    pub stats: RunStats,
    /// Too few attempted items produced records
    pub degraded: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Metadata as saved at the end of the run (absent for dry runs)
    pub metadata: Option<CrawlMetadata>,
}

/// Per-run bookkeeping
struct RunContext {
    cutoff: Option<NaiveDate>,
    known: KnownRecords,
    seen_urls: HashSet<String>,
    seen_ids: HashSet<String>,
    /// Failures that keep the watermark back
    limit: WatermarkLimit,
    stats: RunStats,
}

/// Drives crawl runs for one source strategy
pub struct Orchestrator<S: SourceStrategy> {
    strategy: S,
    fetcher: Fetcher,
    store: RecordStore,
    index: IndexManager,
    degraded_threshold: f64,
    dry_run: bool,
    phase: CrawlPhase,
}

impl<S: SourceStrategy> Orchestrator<S> {
    pub fn new(
        strategy: S,
        fetcher: Fetcher,
        store: RecordStore,
        index: IndexManager,
        degraded_threshold: f64,
    ) -> Self {
        Self {
            strategy,
            fetcher,
            store,
            index,
            degraded_threshold,
            dry_run: false,
            phase: CrawlPhase::Idle,
        }
    }

    /// Creates an orchestrator from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `strategy` - The source to crawl
    /// * `accept_invalid_certs` - Skip TLS certificate verification for this source
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - The data directory is usable and the client is built
    /// * `Err(HarvestError)` - Failed before any network activity
    pub fn from_config(
        config: &Config,
        strategy: S,
        accept_invalid_certs: bool,
    ) -> Result<Self, HarvestError> {
        let data_dir = prepare_data_dir(config)?;
        let store = RecordStore::open(data_dir)?.with_sync_writes(config.output.sync_writes);
        let index = IndexManager::new(&store);
        let fetcher = Fetcher::from_config(config, accept_invalid_certs)?;

        Ok(Self::new(
            strategy,
            fetcher,
            store,
            index,
            config.crawler.degraded_threshold,
        ))
    }

    /// Paces this orchestrator's requests together with every other user of `pacer`
    pub fn with_pacer(mut self, pacer: Arc<Pacer>) -> Self {
        self.fetcher = self.fetcher.with_pacer(pacer);
        self
    }

    /// Walk list pages only: no detail fetches, no writes
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    /// Runs one crawl of the strategy's source
    ///
    /// Network and per-item parse failures are counted, never returned.
    /// Errors are returned only for store or metadata writes that fail.
    pub async fn run(&mut self, mode: CrawlMode) -> Result<RunSummary, HarvestError> {
        let source = self.strategy.source();
        let started_at = Utc::now();

        if self.phase.is_active() {
            warn!(
                "Previous run of {} stopped while {}, starting over",
                source, self.phase
            );
        }
        self.phase = CrawlPhase::Idle;
        self.transition(CrawlPhase::Listing)?;

        let metadata = self.index.load_metadata(source);
        let cutoff = match mode {
            CrawlMode::Full => None,
            CrawlMode::Incremental => metadata.watermark(),
        };

        info!(
            "Starting {} crawl of {}{} (cutoff: {})",
            mode,
            source,
            if self.dry_run { " (dry run)" } else { "" },
            cutoff.map_or_else(|| "none".to_string(), |d| d.to_string())
        );

        let mut ctx = RunContext {
            cutoff,
            known: KnownRecords::load(&self.store, source)?,
            seen_urls: HashSet::new(),
            seen_ids: HashSet::new(),
            limit: WatermarkLimit::default(),
            stats: RunStats::new(),
        };
        let mut frontier = Frontier::new(&self.strategy.navigation());

        while let Some(cursor) = frontier.next() {
            if self.phase == CrawlPhase::Detailing {
                self.transition(CrawlPhase::Listing)?;
            }

            let Some(page) = self.list(&cursor, &mut ctx.stats).await else {
                // Whatever the page listed is unknown
                ctx.limit.tighten(None);
                if matches!(cursor, Cursor::Page(_)) {
                    warn!("Stopping pagination of {} after failed {}", source, cursor);
                    frontier.exhaust();
                }
                continue;
            };
            ctx.stats.list_pages += 1;
            ctx.stats.parse_warnings += page.warnings;

            if matches!(cursor, Cursor::Page(_))
                && !page.items.is_empty()
                && page
                    .items
                    .iter()
                    .all(|item| ctx.seen_urls.contains(&item.detail_url))
            {
                info!(
                    "{} of {} only repeats items already seen, stopping pagination",
                    cursor, source
                );
                frontier.exhaust();
                continue;
            }

            let queued = frontier.advance(&cursor, &page);
            debug!(
                "{}: {} items, {} new cursors, {} pending",
                cursor,
                page.items.len(),
                queued,
                frontier.len()
            );

            self.transition(CrawlPhase::Detailing)?;
            let mut batch = Vec::new();
            for item in &page.items {
                if let Some(stored) = self.resolve_item(item, &mut ctx).await? {
                    batch.push(stored);
                }
            }

            if !batch.is_empty() {
                if let Err(e) = self.index.update_index(source, &batch) {
                    warn!("Index update for {} failed, it will be rebuilt: {}", source, e);
                }
                info!(
                    "Progress: {} appended, {} discovered, {} list pages",
                    ctx.stats.appended, ctx.stats.discovered, ctx.stats.list_pages
                );
            }
        }

        self.transition(CrawlPhase::Finalizing)?;
        let saved = if self.dry_run {
            None
        } else {
            Some(self.index.complete_crawl(source, &metadata, ctx.limit)?)
        };
        self.transition(CrawlPhase::Done)?;

        let stats = ctx.stats;
        let degraded = !self.dry_run && stats.is_degraded(self.degraded_threshold);
        let summary = RunSummary {
            source,
            mode,
            dry_run: self.dry_run,
            cutoff,
            degraded,
            started_at,
            finished_at: Utc::now(),
            metadata: saved,
            stats,
        };

        info!(
            "Crawl of {} finished: {} discovered, {} fetched, {} skipped by cutoff, {} appended, {} duplicates, {} parse failures, {} network failures",
            source,
            summary.stats.discovered,
            summary.stats.fetched,
            summary.stats.skipped_by_cutoff,
            summary.stats.appended,
            summary.stats.duplicates,
            summary.stats.parse_failures,
            summary.stats.network_failures
        );
        if degraded {
            warn!(
                "Crawl of {} is degraded: {} of {} attempted items produced records",
                source,
                summary.stats.parsed,
                summary.stats.attempted()
            );
        }

        Ok(summary)
    }

    fn transition(&mut self, next: CrawlPhase) -> Result<(), HarvestError> {
        if !self.phase.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Fetches and parses the list page at `cursor`; failures are counted
    async fn list(&self, cursor: &Cursor, stats: &mut RunStats) -> Option<ListPage> {
        let request = match self.strategy.list_page_request(cursor) {
            Ok(request) => request,
            Err(e) => {
                warn!("Cannot address {}: {}", cursor, e);
                stats.list_failures += 1;
                return None;
            }
        };

        let page = match self.fetcher.fetch(&request, &mut stats.requests).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to fetch {}: {}", cursor, e);
                stats.list_failures += 1;
                stats.network_failures += 1;
                return None;
            }
        };

        match self.strategy.parse_list_page(&page.body, cursor) {
            Ok(list) => Some(list),
            Err(e) => {
                warn!("Failed to parse {}: {}", cursor, e);
                stats.list_failures += 1;
                stats.parse_failures += 1;
                None
            }
        }
    }

    /// Takes one list item through fetch, parse, dedup and append
    ///
    /// Returns the stored record if one was appended. Only store failures
    /// are errors.
    async fn resolve_item(
        &mut self,
        item: &ListItem,
        ctx: &mut RunContext,
    ) -> Result<Option<StoredRecord>, HarvestError> {
        ctx.stats.discovered += 1;

        if !ctx.seen_urls.insert(item.detail_url.clone()) {
            debug!("Already handled {} in this run", item.detail_url);
            ctx.stats.in_run_duplicates += 1;
            return Ok(None);
        }

        if is_at_or_before(item.updated_date, ctx.cutoff) {
            debug!("Skipping {} (listed as updated {:?})", item.detail_url, item.updated_date);
            ctx.stats.skipped_by_cutoff += 1;
            return Ok(None);
        }

        if self.dry_run {
            return Ok(None);
        }

        ctx.stats.detail_attempts += 1;
        let page = match self
            .fetcher
            .fetch(&PageRequest::get(&item.detail_url), &mut ctx.stats.requests)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to fetch {}: {}", item.detail_url, e);
                ctx.stats.network_failures += 1;
                ctx.limit.tighten(item.updated_date);
                return Ok(None);
            }
        };
        ctx.stats.fetched += 1;

        let draft = match self.strategy.parse_detail_page(&page.body, item) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Failed to parse {}: {}", item.detail_url, e);
                ctx.stats.parse_failures += 1;
                ctx.limit.tighten(item.updated_date);
                return Ok(None);
            }
        };

        let id = ctx.known.assign_id(&draft);
        let fetched_at = ctx.known.stamp(Utc::now());
        let record = match draft.into_record(id, fetched_at) {
            Ok(record) => record,
            Err(e) => {
                warn!("Rejected record from {}: {}", item.detail_url, e);
                ctx.stats.parse_failures += 1;
                ctx.limit.tighten(item.updated_date);
                return Ok(None);
            }
        };

        // The detail page's date is authoritative once fetched
        if is_at_or_before(record.updated_date(), ctx.cutoff) {
            debug!(
                "Skipping {} (detail updated {:?})",
                record.id(),
                record.updated_date()
            );
            ctx.stats.skipped_by_cutoff += 1;
            return Ok(None);
        }

        if !ctx.seen_ids.insert(record.id().to_string()) {
            debug!("Already produced {} in this run", record.id());
            ctx.stats.in_run_duplicates += 1;
            return Ok(None);
        }
        ctx.stats.parsed += 1;

        match ctx.known.admit(&record) {
            Admission::Duplicate => {
                debug!("{} is unchanged", record.id());
                ctx.stats.duplicates += 1;
                return Ok(None);
            }
            Admission::Supersedes => debug!("{} has a newer version", record.id()),
            Admission::New => {}
        }

        let position = self.store.append(&record)?;
        ctx.known.observe(&record);
        ctx.stats.appended += 1;

        Ok(Some(StoredRecord { position, record }))
    }
}

fn is_at_or_before(date: Option<NaiveDate>, cutoff: Option<NaiveDate>) -> bool {
    matches!((date, cutoff), (Some(date), Some(cutoff)) if date <= cutoff)
}

/// Runs one crawl of a configured source
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `source` - Which configured source to crawl
/// * `mode` - Full or incremental
/// * `dry_run` - Only walk list pages
/// * `pacer` - Pacing shared with every other crawl in the process
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run finished (possibly degraded)
/// * `Err(HarvestError)` - Configuration or storage failure
///
/// # Example
///
/// ```no_run
/// use faq_harvest::config::load_config;
/// use faq_harvest::crawler::{run_crawl, CrawlMode, Pacer};
/// use faq_harvest::Source;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let pacer = Arc::new(Pacer::from_config(&config.crawler));
/// let summary = run_crawl(&config, Source::Mol, CrawlMode::Incremental, false, &pacer).await?;
/// println!("{} new records", summary.stats.appended);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    source: Source,
    mode: CrawlMode,
    dry_run: bool,
    pacer: &Arc<Pacer>,
) -> Result<RunSummary, HarvestError> {
    let entry = config.source(source).ok_or_else(|| {
        ConfigError::Validation(format!("source '{}' is not configured", source))
    })?;
    let strategy = SiteStrategy::from_config(entry)?;

    let mut orchestrator =
        Orchestrator::from_config(config, strategy, entry.accept_invalid_certs)?
            .with_pacer(Arc::clone(pacer))
            .with_dry_run(dry_run);
    orchestrator.run(mode).await
}
