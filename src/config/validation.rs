use crate::config::types::{ClassifierConfig, Config, CrawlerConfig, FetchConfig, StorageConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on concurrent fetches
const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_storage_config(&config.storage)?;
    validate_classifier_config(&config.classifier)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth < 1 {
        return Err(ConfigError::Validation(
            "max_depth must be a positive integer, got 0".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if let Some(seed) = &config.seed_url {
        validate_seed_url(seed)?;
    }

    Ok(())
}

fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_ms must be > 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_dir.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.candidate_labels.is_empty() {
        return Err(ConfigError::Validation(
            "candidate_labels must contain at least one label".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for label in &config.candidate_labels {
        if label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "candidate labels cannot be empty".to_string(),
            ));
        }
        if !seen.insert(label.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate candidate label '{}'",
                label
            )));
        }
    }

    for label in config.keywords.keys() {
        if !seen.contains(label.as_str()) {
            return Err(ConfigError::Validation(format!(
                "keywords given for unknown label '{}'",
                label
            )));
        }
    }

    Ok(())
}
