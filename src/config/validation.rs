use crate::config::types::{
    natural_navigation, Config, CrawlerConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Placeholder replaced by the page number in flat list URLs
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Deepest tree level accepted in configuration
const MAX_TREE_DEPTH: u32 = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.min_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_interval_ms must be >= 100ms, got {}ms",
            config.min_interval_ms
        )));
    }

    if !(config.degraded_threshold > 0.0 && config.degraded_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "degraded_threshold must be in (0, 1], got {}",
            config.degraded_threshold
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the `[[source]]` entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for entry in sources {
        let source = entry
            .source()
            .ok_or_else(|| ConfigError::UnknownSource(entry.name.clone()))?;

        if !seen.insert(source) {
            return Err(ConfigError::Validation(format!(
                "source '{}' is configured more than once",
                source
            )));
        }

        let expected = natural_navigation(source);
        if let Some(navigation) = entry.navigation {
            if navigation != expected {
                return Err(ConfigError::Validation(format!(
                    "source '{}' uses {:?} navigation, not {:?}",
                    source, expected, navigation
                )));
            }
        }

        let list_url = entry.list_url.replace(PAGE_PLACEHOLDER, "1");
        Url::parse(&list_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid list-url for '{}': {}", source, e))
        })?;

        if let Some(base_url) = &entry.base_url {
            Url::parse(base_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid base-url for '{}': {}", source, e))
            })?;
        }

        if entry.max_pages == Some(0) {
            return Err(ConfigError::Validation(format!(
                "max-pages for '{}' must be >= 1",
                source
            )));
        }

        if let Some(depth) = entry.max_depth {
            if depth < 1 || depth > MAX_TREE_DEPTH {
                return Err(ConfigError::Validation(format!(
                    "max-depth for '{}' must be between 1 and {}, got {}",
                    source, MAX_TREE_DEPTH, depth
                )));
            }
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
