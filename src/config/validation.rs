use crate::config::types::{Config, CrawlerConfig, LoggingConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_logging_config(&config.logging)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth and delay are unsigned, so no lower bound checks

    validate_seed_url(&config.seed_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a seed URL is an absolute http(s) URL
pub fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use the http or https scheme",
            seed
        )));
    }

    Ok(())
}

/// Validates logging configuration
fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if config.file.is_empty() {
        return Err(ConfigError::Validation(
            "logging file cannot be empty".to_string(),
        ));
    }

    if !LOG_LEVELS.contains(&config.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging level must be one of {}, got '{}'",
            LOG_LEVELS.join(", "),
            config.level
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.crawled_urls_path.is_empty() {
        return Err(ConfigError::Validation(
            "crawled_urls_path cannot be empty".to_string(),
        ));
    }

    if config.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state_path cannot be empty".to_string(),
        ));
    }

    if config.state_path == config.crawled_urls_path {
        return Err(ConfigError::Validation(format!(
            "state_path and crawled_urls_path must differ, both are '{}'",
            config.state_path
        )));
    }

    Ok(())
}
