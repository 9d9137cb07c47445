//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings and timeouts
//! - Pacing every attempt through a shared [`Pacer`]
//! - Retrying transient failures with fixed or exponential backoff
//! - Honoring `Retry-After` on HTTP 429, within a configured ceiling
//! - Error classification
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx | Return the page |
//! | HTTP 429 | Retry after max(backoff, Retry-After capped) |
//! | HTTP 5xx | Retry after backoff |
//! | Other HTTP 4xx | Fail immediately |
//! | Timeout, connection error, broken body | Retry after backoff |
//!
//! After `max_attempts` failed attempts the fetch gives up with
//! [`FetchError::Exhausted`].

use super::pacer::Pacer;
use super::strategy::{HttpMethod, PageRequest};
use crate::config::{BackoffStrategy, Config, CrawlerConfig, UserAgentConfig};
use crate::state::RequestStats;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Page body content
    pub body: String,
}

/// Reasons a fetch did not produce a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Client { url: String, status: u16 },

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Could not build request for {url}: {message}")]
    Build { url: String, message: String },
}

/// Retry behavior for one fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub backoff: BackoffStrategy,
    pub max_retry_after: Duration,
}

impl FetchPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::Fixed => self.retry_delay,
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.retry_delay.saturating_mul(factor)
            }
        }
    }

    /// Wait before the next attempt, honoring a server hint within bounds
    pub fn wait_before_retry(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match hint {
            Some(hint) => hint.min(self.max_retry_after).max(backoff),
            None => backoff,
        }
    }
}

impl From<&CrawlerConfig> for FetchPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            backoff: config.backoff,
            max_retry_after: Duration::from_secs(config.max_retry_after_secs),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts come from here
/// * `accept_invalid_certs` - Skip TLS certificate verification
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use faq_harvest::config::{CrawlerConfig, UserAgentConfig};
/// use faq_harvest::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "FaqHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default(), false).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
    accept_invalid_certs: bool,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(agent)
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Paced, retrying HTTP fetcher
///
/// Clones share the same client and pacer.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
    pacer: Arc<Pacer>,
}

enum Attempt {
    Done(FetchedPage),
    Retry {
        reason: String,
        hint: Option<Duration>,
        rate_limited: bool,
    },
    Fatal(FetchError),
}

impl Fetcher {
    pub fn new(client: Client, policy: FetchPolicy, min_interval: Duration) -> Self {
        Self {
            client,
            policy,
            pacer: Arc::new(Pacer::new(min_interval)),
        }
    }

    /// Builds a fetcher from the crawler and user agent sections
    pub fn from_config(config: &Config, accept_invalid_certs: bool) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, &config.crawler, accept_invalid_certs)?;
        Ok(Self::new(
            client,
            FetchPolicy::from(&config.crawler),
            Duration::from_millis(config.crawler.min_interval_ms),
        ))
    }

    /// Replaces this fetcher's pacer with one shared by other fetchers
    ///
    /// Requests from every fetcher holding the same pacer are spaced as if
    /// they came from one.
    pub fn with_pacer(mut self, pacer: Arc<Pacer>) -> Self {
        debug!(
            "Sharing a pacer ({:?} between requests)",
            pacer.min_interval()
        );
        self.pacer = pacer;
        self
    }

    /// Fetches a page, retrying transient failures
    ///
    /// # Arguments
    ///
    /// * `request` - What to fetch
    /// * `stats` - Run counters; every attempt is recorded
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - A 2xx response and its body
    /// * `Err(FetchError)` - A non-retryable status, or retries ran out
    pub async fn fetch(
        &self,
        request: &PageRequest,
        stats: &mut RequestStats,
    ) -> Result<FetchedPage, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            self.pacer.wait_turn().await;
            stats.attempts += 1;

            match self.attempt(request).await {
                Attempt::Done(page) => {
                    stats.successes += 1;
                    debug!("Fetched {} ({} bytes)", page.url, page.body.len());
                    return Ok(page);
                }
                Attempt::Fatal(e) => {
                    stats.failures += 1;
                    return Err(e);
                }
                Attempt::Retry {
                    reason,
                    hint,
                    rate_limited,
                } => {
                    stats.failures += 1;
                    if rate_limited {
                        stats.rate_limited += 1;
                    }

                    if attempt < self.policy.max_attempts {
                        let wait = self.policy.wait_before_retry(attempt, hint);
                        warn!(
                            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt, self.policy.max_attempts, request.url, reason, wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_error = reason;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: request.url.clone(),
            attempts: self.policy.max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, request: &PageRequest) -> Attempt {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.form),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Fatal(FetchError::Build {
                    url: request.url.clone(),
                    message: e.to_string(),
                })
            }
            Err(e) => {
                return Attempt::Retry {
                    reason: classify_error(&e),
                    hint: None,
                    rate_limited: false,
                }
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry {
                reason: "HTTP 429".to_string(),
                hint: parse_retry_after(response.headers(), Utc::now()),
                rate_limited: true,
            };
        }

        if status.is_server_error() {
            return Attempt::Retry {
                reason: format!("HTTP {}", status.as_u16()),
                hint: None,
                rate_limited: false,
            };
        }

        if !status.is_success() {
            return Attempt::Fatal(FetchError::Client {
                url: final_url,
                status: status.as_u16(),
            });
        }

        match response.text().await {
            Ok(body) => Attempt::Done(FetchedPage {
                url: final_url,
                status: status.as_u16(),
                body,
            }),
            Err(e) => Attempt::Retry {
                reason: format!("body read failed: {}", e),
                hint: None,
                rate_limited: false,
            },
        }
    }
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}

/// Reads a `Retry-After` header as either delay-seconds or an HTTP date
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
