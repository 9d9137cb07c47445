//! FAQ Harvest main entry point
//!
//! This is the command-line interface for the incremental FAQ harvester.

use anyhow::{bail, Context, Result};
use clap::Parser;
use faq_harvest::config::{load_config_with_hash, prepare_data_dir, Config};
use faq_harvest::crawler::{run_crawl, CrawlMode, Pacer};
use faq_harvest::output::{
    export_documents, load_source_statistics, print_run_summary, print_source_statistics,
};
use faq_harvest::storage::{IndexManager, RecordStore};
use faq_harvest::Source;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// FAQ Harvest: an incremental question/answer harvester
///
/// Crawls the configured FAQ sources, appends new or updated records to
/// per-source JSON Lines stores, and keeps their indexes and watermarks
/// current so the next run only fetches what changed.
#[derive(Parser, Debug)]
#[command(name = "faq-harvest")]
#[command(version)]
#[command(about = "An incremental FAQ harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only process this source (repeatable; default: every configured source)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Ignore the watermark and fetch every item
    #[arg(long)]
    full: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Walk list pages and report what would be fetched, without fetching or writing
    #[arg(long, conflicts_with_all = ["stats", "rebuild_index", "export_documents"])]
    dry_run: bool,

    /// Show store, index and metadata statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "rebuild_index", "export_documents"])]
    stats: bool,

    /// Rebuild indexes and metadata from the stores and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_documents"])]
    rebuild_index: bool,

    /// Write one plain-text document per current record into DIR and exit
    #[arg(long, value_name = "DIR", conflicts_with_all = ["dry_run", "stats", "rebuild_index"])]
    export_documents: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, &cli.sources)?;

    // Handle different modes
    if cli.stats {
        handle_stats(&config, &sources)?;
    } else if cli.rebuild_index {
        handle_rebuild_index(&config, &sources)?;
    } else if let Some(dir) = &cli.export_documents {
        handle_export_documents(&config, &sources, dir)?;
    } else {
        let mode = if cli.full {
            CrawlMode::Full
        } else {
            CrawlMode::Incremental
        };
        handle_crawl(&config, &sources, mode, cli.dry_run).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("faq_harvest=info,warn"),
            1 => EnvFilter::new("faq_harvest=debug,info"),
            2 => EnvFilter::new("faq_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves `--source` names against the configuration
fn select_sources(config: &Config, names: &[String]) -> Result<Vec<Source>> {
    if names.is_empty() {
        return Ok(config
            .sources
            .iter()
            .filter_map(|entry| entry.source())
            .collect());
    }

    let mut selected = Vec::new();
    for name in names {
        let Some(source) = Source::from_name(name) else {
            bail!("Unknown source '{}' (expected one of mol, bli, osha)", name);
        };
        if config.source(source).is_none() {
            bail!("Source '{}' is not configured", source);
        }
        if !selected.contains(&source) {
            selected.push(source);
        }
    }
    Ok(selected)
}

fn open_store(config: &Config) -> Result<(RecordStore, IndexManager)> {
    let data_dir = prepare_data_dir(config).context("Data directory is not usable")?;
    let store = RecordStore::open(&data_dir)
        .with_context(|| format!("Failed to open record store at {}", data_dir.display()))?
        .with_sync_writes(config.output.sync_writes);
    let index = IndexManager::new(&store);
    Ok((store, index))
}

/// Handles the --stats mode: shows what each source's files hold
fn handle_stats(config: &Config, sources: &[Source]) -> Result<()> {
    let (store, index) = open_store(config)?;
    println!("Data directory: {}\n", store.root().display());

    for &source in sources {
        let stats = load_source_statistics(&index, &store, source)
            .with_context(|| format!("Failed to read statistics for {}", source))?;
        print_source_statistics(&stats);
    }

    Ok(())
}

/// Handles the --rebuild-index mode: reconstructs indexes from the stores
fn handle_rebuild_index(config: &Config, sources: &[Source]) -> Result<()> {
    let (_store, index) = open_store(config)?;

    for &source in sources {
        let rebuilt = index
            .rebuild_index(source)
            .with_context(|| format!("Failed to rebuild index for {}", source))?;
        println!(
            "✓ {}: {} records indexed over {} lines",
            source,
            rebuilt.len(),
            rebuilt.indexed_lines
        );
    }

    Ok(())
}

/// Handles the --export-documents mode: writes plain-text documents
fn handle_export_documents(config: &Config, sources: &[Source], dir: &Path) -> Result<()> {
    let (store, _index) = open_store(config)?;

    let mut records = Vec::new();
    for &source in sources {
        let current = store
            .current_records(source)
            .with_context(|| format!("Failed to read records for {}", source))?;
        tracing::info!("Loaded {} current records from {}", current.len(), source);
        records.extend(current);
    }

    let summary = export_documents(dir, &records)
        .with_context(|| format!("Failed to export documents to {}", dir.display()))?;

    println!(
        "✓ Exported {} of {} documents to {}",
        summary.written,
        summary.total,
        summary.output_dir.display()
    );
    for (source, count) in &summary.by_source {
        println!("  - {}: {}", source, count);
    }
    if summary.failed > 0 {
        bail!("{} documents could not be written", summary.failed);
    }

    Ok(())
}

/// Handles the main crawl operation, one source after another
async fn handle_crawl(
    config: &Config,
    sources: &[Source],
    mode: CrawlMode,
    dry_run: bool,
) -> Result<()> {
    tracing::info!(
        "Starting {} crawl of {} source(s){}",
        mode,
        sources.len(),
        if dry_run { " (dry run)" } else { "" }
    );

    // One pacing budget for every source
    let pacer = Arc::new(Pacer::from_config(&config.crawler));

    let mut degraded = Vec::new();
    for &source in sources {
        let summary = run_crawl(config, source, mode, dry_run, &pacer)
            .await
            .with_context(|| format!("Crawl of {} failed", source))?;
        print_run_summary(&summary);
        if summary.degraded {
            degraded.push(source);
        }
    }

    if degraded.is_empty() {
        tracing::info!("Crawl completed successfully");
    } else {
        tracing::warn!(
            "Crawl completed; degraded sources: {}",
            degraded
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(())
}
