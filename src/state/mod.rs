//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: where a run is (idle, listing, detailing, finalizing, done)
//! - `RunStats`: counters for one run, including the fetcher's request counters

mod crawl_phase;
mod run_stats;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use run_stats::{RequestStats, RunStats};
