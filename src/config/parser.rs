use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use faq_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Data directory: {}", config.output.data_dir);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Creates the data directory and checks that it is writable
///
/// Fails with a validation error when the directory cannot be created or
/// written to.
pub fn prepare_data_dir(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = PathBuf::from(&config.output.data_dir);

    std::fs::create_dir_all(&dir).map_err(|e| {
        ConfigError::Validation(format!(
            "data_dir '{}' cannot be created: {}",
            dir.display(),
            e
        ))
    })?;

    let marker = dir.join(".write-test");
    std::fs::write(&marker, b"")
        .and_then(|_| std::fs::remove_file(&marker))
        .map_err(|e| {
            ConfigError::Validation(format!(
                "data_dir '{}' is not writable: {}",
                dir.display(),
                e
            ))
        })?;

    Ok(dir)
}
