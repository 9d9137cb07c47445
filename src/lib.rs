//! FAQ Harvest: an incremental question/answer harvester
//!
//! This crate crawls government FAQ sites through pluggable source strategies,
//! appends the resulting records to per-source JSON Lines stores, and keeps
//! date/source/category indexes and a crawl watermark next to each store so
//! repeat runs only fetch what changed.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod sources;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid record: {0}")]
    Validation(#[from] record::ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] storage::IndexError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Errors raised by source strategies while reading fetched pages
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cursor {0} does not apply to this source")]
    UnsupportedCursor(String),

    #[error("Malformed page: {0}")]
    Malformed(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for strategy parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlMode, Orchestrator, RunSummary, SourceStrategy};
pub use record::{Record, RecordDraft, Source};
pub use state::{CrawlPhase, RunStats};
pub use storage::{IndexManager, Position, RecordStore};
