//! Configuration module for FAQ Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use faq_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Retrying each request up to {} times", config.crawler.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    natural_navigation, BackoffStrategy, Config, CrawlerConfig, NavigationMode, OutputConfig,
    SourceConfig, UserAgentConfig,
};
pub use validation::PAGE_PLACEHOLDER;

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, prepare_data_dir};
