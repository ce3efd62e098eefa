use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

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
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash over the settings that shape crawl results
///
/// Only the seed, the depth limit and the classifier setup are hashed;
/// tuning knobs like worker count or timeouts can change between a crash
/// and a resume without invalidating the stored run.
pub fn compute_config_hash(config: &Config) -> String {
    let fingerprint = serde_json::json!({
        "seed_url": config.crawler.seed_url,
        "max_depth": config.crawler.max_depth,
        "classifier": config.classifier,
    });

    let mut hasher = Sha256::new();
    hasher.update(fingerprint.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
