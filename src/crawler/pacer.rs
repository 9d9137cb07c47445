//! Request pacing
//!
//! Every outbound request, including retries and list pages, waits for its
//! turn here so consecutive requests are at least `min_interval` apart.

use crate::config::CrawlerConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    /// A pacer using the configured minimum interval
    pub fn from_config(crawler: &CrawlerConfig) -> Self {
        Self::new(Duration::from_millis(crawler.min_interval_ms))
    }

    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, last: Option<Instant>, now: Instant) -> Option<Duration> {
        let last = last?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Waits until a request may be sent and records it as sent
    ///
    /// The lock is held while sleeping, so concurrent callers queue up and
    /// are released one interval apart.
    pub async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(wait) = self.time_until_next_request(*last, Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
    }
}
