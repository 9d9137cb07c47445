//! Run-scoped counters
//!
//! A fresh [`RunStats`] is created for each crawl, threaded through the
//! fetcher and orchestrator, and returned with the run summary.

/// Counters kept by the fetcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Every HTTP attempt, including retries
    pub attempts: u64,
    /// Attempts that returned a usable page
    pub successes: u64,
    /// Attempts that failed for any reason
    pub failures: u64,
    /// Attempts answered with HTTP 429
    pub rate_limited: u64,
}

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub requests: RequestStats,
    /// List pages or tree nodes parsed
    pub list_pages: u64,
    /// List pages or tree nodes that could not be fetched or parsed
    pub list_failures: u64,
    /// List items seen
    pub discovered: u64,
    /// Items skipped because their date is at or before the watermark
    pub skipped_by_cutoff: u64,
    /// Items already seen earlier in the same run
    pub in_run_duplicates: u64,
    /// Detail pages a fetch was attempted for
    pub detail_attempts: u64,
    /// Detail pages fetched
    pub fetched: u64,
    /// Detail pages that produced a new, in-range record
    pub parsed: u64,
    /// Detail pages whose fetch gave up
    pub network_failures: u64,
    /// Detail pages that could not be turned into a valid record
    pub parse_failures: u64,
    /// Malformed list entries that were skipped
    pub parse_warnings: u64,
    /// Records identical to or older than what the store already holds
    pub duplicates: u64,
    /// Records written to the store
    pub appended: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovered items that were neither skipped nor repeats
    pub fn attempted(&self) -> u64 {
        self.discovered
            .saturating_sub(self.skipped_by_cutoff)
            .saturating_sub(self.in_run_duplicates)
    }

    /// Returns true if too few attempted items produced records
    ///
    /// A run with nothing to attempt is never degraded.
    pub fn is_degraded(&self, threshold: f64) -> bool {
        let attempted = self.attempted();
        attempted > 0 && (self.parsed as f64) < (attempted as f64) * threshold
    }

    /// Fraction of attempted items that produced records
    pub fn success_rate(&self) -> Option<f64> {
        match self.attempted() {
            0 => None,
            attempted => Some(self.parsed as f64 / attempted as f64),
        }
    }
}
