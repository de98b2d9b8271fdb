use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, ExtractionMode, ModelConfig, OutputConfig,
    RenderingConfig, SeedEntry, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_model_config(&config.model)?;
    validate_output_config(&config.output)?;
    validate_rendering_config(&config.rendering)?;
    validate_extraction_config(&config.extraction)?;

    for pattern in config.domains.allow.iter().chain(&config.domains.block) {
        validate_domain_pattern(pattern)?;
    }

    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_links_per_page < 1 {
        return Err(ConfigError::Validation(
            "max_links_per_page must be >= 1".to_string(),
        ));
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
        .all(|c| c.is_alphanumeric() || c == '-')
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

/// Validates relevance model configuration
fn validate_model_config(config: &ModelConfig) -> Result<(), ConfigError> {
    if !config.learning_rate.is_finite() || config.learning_rate <= 0.0 || config.learning_rate > 10.0
    {
        return Err(ConfigError::Validation(format!(
            "learning_rate must be in (0, 10], got {}",
            config.learning_rate
        )));
    }

    if matches!(&config.snapshot_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "snapshot_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.checkpoint_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates rendering configuration
fn validate_rendering_config(config: &RenderingConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid rendering endpoint: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Rendering endpoint must be HTTP(S), got '{}'",
                endpoint
            )));
        }
    }

    for pattern in &config.dynamic_hosts {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Validates extraction configuration
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.min_populated_fields < 1 || config.min_populated_fields > 4 {
        return Err(ConfigError::Validation(format!(
            "min_populated_fields must be between 1 and 4, got {}",
            config.min_populated_fields
        )));
    }

    if config.mode == ExtractionMode::Llm && config.providers.is_empty() {
        return Err(ConfigError::Validation(
            "LLM extraction requires at least one [[extraction.providers]] entry".to_string(),
        ));
    }

    for provider in &config.providers {
        Url::parse(&provider.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid base_url for provider '{}': {}",
                provider.name, e
            ))
        })?;

        if provider.model.is_empty() || provider.api_key_env.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Provider '{}' needs both model and api_key_env",
                provider.name
            )));
        }
    }

    Ok(())
}

/// Validates seed URLs declared in the config file
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(&seed.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed.url
            )));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

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
