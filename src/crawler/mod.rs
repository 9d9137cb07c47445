//! Crawler module for harvesting FAQ sources
//!
//! This module contains the core crawling logic, including:
//! - The source strategy interface implemented per site
//! - HTTP fetching with pacing and retry logic
//! - The navigation frontier for paged lists and category trees
//! - Deduplication against what the store already holds
//! - Overall crawl orchestration

mod coordinator;
mod dedup;
mod fetcher;
mod frontier;
mod pacer;
mod strategy;

pub use coordinator::{run_crawl, CrawlMode, Orchestrator, RunSummary};
pub use dedup::{Admission, KnownRecords};
pub use fetcher::{build_http_client, parse_retry_after, FetchError, FetchPolicy, FetchedPage, Fetcher};
pub use frontier::Frontier;
pub use pacer::Pacer;
pub use strategy::{
    Cursor, HttpMethod, ListItem, ListPage, Navigation, PageRequest, SourceStrategy, TreeNode,
};
