use crate::record::Source;
use serde::Deserialize;

/// Main configuration structure for FAQ Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Finds the entry for a source, if configured
    pub fn source(&self, source: Source) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|entry| entry.source() == Some(source))
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Attempts per request before giving up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// How the retry delay grows between attempts
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Minimum time between any two requests (milliseconds)
    #[serde(rename = "min-interval-ms", default = "default_min_interval")]
    pub min_interval_ms: u64,

    /// Upper bound on a server-provided Retry-After wait (seconds)
    #[serde(rename = "max-retry-after-secs", default = "default_max_retry_after")]
    pub max_retry_after_secs: u64,

    /// Fraction of attempted detail pages that must succeed for a healthy run
    #[serde(rename = "degraded-threshold", default = "default_degraded_threshold")]
    pub degraded_threshold: f64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            backoff: BackoffStrategy::default(),
            min_interval_ms: default_min_interval(),
            max_retry_after_secs: default_max_retry_after(),
            degraded_threshold: default_degraded_threshold(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_min_interval() -> u64 {
    2000
}

fn default_max_retry_after() -> u64 {
    120
}

fn default_degraded_threshold() -> f64 {
    0.5
}

/// Retry delay growth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// The same delay before every retry
    Fixed,
    /// The delay doubles after every failed attempt
    #[default]
    Exponential,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one sub-directory per source
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Flush every append to disk before continuing
    #[serde(rename = "sync-writes", default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_sync_writes() -> bool {
    true
}

/// How a source's list pages are organized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationMode {
    /// Numbered list pages
    Flat,
    /// A category tree walked depth-first
    Tree,
}

/// One `[[source]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source short name (`mol`, `bli`, `osha`)
    pub name: String,

    /// Expected navigation mode; must match the source when given
    #[serde(default)]
    pub navigation: Option<NavigationMode>,

    /// First list page; flat sources put `{page}` where the page number goes
    #[serde(rename = "list-url")]
    pub list_url: String,

    /// Base for resolving relative links (defaults to the list URL's origin)
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    /// Flat sources: stop after this many list pages
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Tree sources: deepest node level to visit
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Tree sources: only follow links whose path contains this prefix
    #[serde(rename = "path-filter", default)]
    pub path_filter: Option<String>,

    /// Accept TLS certificates that fail verification
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,
}

impl SourceConfig {
    pub fn source(&self) -> Option<Source> {
        Source::from_name(&self.name)
    }
}

/// Navigation mode a source's site actually uses
pub fn natural_navigation(source: Source) -> NavigationMode {
    match source {
        Source::Mol => NavigationMode::Flat,
        Source::Bli | Source::Osha => NavigationMode::Tree,
    }
}
