//! Source strategies for the harvested sites
//!
//! Each site gets its own [`SourceStrategy`] implementation holding only
//! extraction rules. [`SiteStrategy`] picks the right one from a
//! `[[source]]` configuration entry.

mod bli;
mod mol;
mod osha;
pub mod text;

pub use bli::BliStrategy;
pub use mol::MolStrategy;
pub use osha::OshaStrategy;

use crate::config::{SourceConfig, PAGE_PLACEHOLDER};
use crate::crawler::{Cursor, ListItem, ListPage, Navigation, PageRequest, SourceStrategy};
use crate::record::{RecordDraft, Source};
use crate::{ConfigError, ParseResult};
use url::Url;

/// Depth limit for category trees when none is configured
pub const DEFAULT_MAX_DEPTH: u32 = 5;

/// One of the built-in site strategies
#[derive(Debug, Clone)]
pub enum SiteStrategy {
    Mol(MolStrategy),
    Bli(BliStrategy),
    Osha(OshaStrategy),
}

impl SiteStrategy {
    /// Builds the strategy for a configured source
    ///
    /// # Arguments
    ///
    /// * `entry` - A validated `[[source]]` entry
    ///
    /// # Returns
    ///
    /// * `Ok(SiteStrategy)` - Strategy ready to crawl
    /// * `Err(ConfigError)` - Unknown source name or unusable URL
    pub fn from_config(entry: &SourceConfig) -> Result<Self, ConfigError> {
        let source = entry
            .source()
            .ok_or_else(|| ConfigError::UnknownSource(entry.name.clone()))?;
        let base = base_url(entry)?;
        let max_depth = entry.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);

        Ok(match source {
            Source::Mol => Self::Mol(
                MolStrategy::new(entry.list_url.clone(), base).with_max_pages(entry.max_pages),
            ),
            Source::Bli => Self::Bli(BliStrategy::new(entry.list_url.clone(), base, max_depth)),
            Source::Osha => Self::Osha(
                OshaStrategy::new(entry.list_url.clone(), base, max_depth)
                    .with_path_filter(entry.path_filter.clone()),
            ),
        })
    }
}

/// The configured base URL, or the list URL's origin
fn base_url(entry: &SourceConfig) -> Result<Url, ConfigError> {
    let raw = match &entry.base_url {
        Some(base) => base.clone(),
        None => entry.list_url.replace(PAGE_PLACEHOLDER, "1"),
    };
    let url = Url::parse(&raw).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid URL for '{}': {}", entry.name, e))
    })?;

    if entry.base_url.is_some() {
        return Ok(url);
    }
    url.join("/").map_err(|e| {
        ConfigError::InvalidUrl(format!("No origin in list-url for '{}': {}", entry.name, e))
    })
}

impl SourceStrategy for SiteStrategy {
    fn source(&self) -> Source {
        match self {
            Self::Mol(strategy) => strategy.source(),
            Self::Bli(strategy) => strategy.source(),
            Self::Osha(strategy) => strategy.source(),
        }
    }

    fn navigation(&self) -> Navigation {
        match self {
            Self::Mol(strategy) => strategy.navigation(),
            Self::Bli(strategy) => strategy.navigation(),
            Self::Osha(strategy) => strategy.navigation(),
        }
    }

    fn list_page_request(&self, cursor: &Cursor) -> ParseResult<PageRequest> {
        match self {
            Self::Mol(strategy) => strategy.list_page_request(cursor),
            Self::Bli(strategy) => strategy.list_page_request(cursor),
            Self::Osha(strategy) => strategy.list_page_request(cursor),
        }
    }

    fn parse_list_page(&self, body: &str, cursor: &Cursor) -> ParseResult<ListPage> {
        match self {
            Self::Mol(strategy) => strategy.parse_list_page(body, cursor),
            Self::Bli(strategy) => strategy.parse_list_page(body, cursor),
            Self::Osha(strategy) => strategy.parse_list_page(body, cursor),
        }
    }

    fn parse_detail_page(&self, body: &str, item: &ListItem) -> ParseResult<RecordDraft> {
        match self {
            Self::Mol(strategy) => strategy.parse_detail_page(body, item),
            Self::Bli(strategy) => strategy.parse_detail_page(body, item),
            Self::Osha(strategy) => strategy.parse_detail_page(body, item),
        }
    }
}
