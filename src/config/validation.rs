use crate::config::types::{Config, CrawlConfig, GitHubConfig, OutputConfig, RetryConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_github_config(&config.github)?;
    validate_crawl_config(&config.crawl)?;
    validate_retry_config("retry.search", &config.retry.search)?;
    validate_retry_config("retry.api", &config.retry.api)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates GitHub endpoint configuration
fn validate_github_config(config: &GitHubConfig) -> Result<(), ConfigError> {
    validate_base_url("api-url", &config.api_url)?;
    validate_base_url("raw-url", &config.raw_url)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-every must be >= 1, got {}",
            config.checkpoint_every
        )));
    }

    if config.default_branch.trim().is_empty() {
        return Err(ConfigError::Validation(
            "default-branch cannot be empty".to_string(),
        ));
    }

    if let Some(queries) = &config.queries {
        if queries.is_empty() {
            return Err(ConfigError::Validation(
                "queries must contain at least one entry when set".to_string(),
            ));
        }
        if let Some(blank) = queries.iter().position(|q| q.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "queries[{}] cannot be empty",
                blank
            )));
        }
    }

    Ok(())
}

/// Validates one retry policy
fn validate_retry_config(section: &str, config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max-attempts must be >= 1, got {}",
            section, config.max_attempts
        )));
    }

    if config.max_delay_ms < config.initial_delay_ms {
        return Err(ConfigError::Validation(format!(
            "{}.max-delay-ms ({}) must be >= initial-delay-ms ({})",
            section, config.max_delay_ms, config.initial_delay_ms
        )));
    }

    if !config.backoff_multiplier.is_finite() || config.backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "{}.backoff-multiplier must be a finite number >= 1.0, got {}",
            section, config.backoff_multiplier
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.state_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "state-file cannot be empty".to_string(),
        ));
    }

    // The extension becomes part of every artifact filename
    if config.extension.is_empty()
        || !config
            .extension
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ConfigError::Validation(format!(
            "extension must be non-empty and alphanumeric, got '{}'",
            config.extension
        )));
    }

    Ok(())
}
