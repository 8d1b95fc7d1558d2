use crate::config::types::{
    Config, CrawlerConfig, ExtractConfig, OutputConfig, PageNumbering, PaginationConfig,
    ProxyConfig, SeedConfig,
};
use crate::storage::RESERVED_KEYS;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_pagination_config(&config.pagination)?;
    validate_seeds(&config.seeds)?;
    validate_extract_config(&config.extract)?;
    validate_proxy_config(&config.proxies)?;

    if config.identity.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "identity.user-agents cannot contain blank entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    for (name, value) in [
        ("max_concurrent_requests", config.max_concurrent_requests),
        ("page_concurrency", config.page_concurrency),
        ("item_concurrency", config.item_concurrency),
    ] {
        if !(1..=100).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 100, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.store_path.is_empty() {
        return Err(ConfigError::Validation(
            "store_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    validate_selector(&config.last_page_selector)?;

    if config.max_pages == 0 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    for numbering in [&config.listing_numbering, &config.collection_numbering] {
        if let PageNumbering::QueryParam { name } = numbering {
            if name.is_empty() {
                return Err(ConfigError::Validation(
                    "query-param numbering needs a non-empty name".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "proxies.path cannot be empty".to_string(),
        ));
    }

    if config.check_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "proxies.check-timeout-secs must be >= 1".to_string(),
        ));
    }

    let url = Url::parse(&config.check_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid check URL '{}': {}", config.check_url, e))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Check URL '{}' must use HTTP or HTTPS",
            config.check_url
        )));
    }

    Ok(())
}

/// Validates seed URLs; at least one seed of either kind is required
fn validate_seeds(seeds: &SeedConfig) -> Result<(), ConfigError> {
    if seeds.listings.is_empty() && seeds.collections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one listing or collection seed is required".to_string(),
        ));
    }

    for seed in seeds.listings.iter().chain(seeds.collections.iter()) {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    validate_selector(&config.collection_links.selector)?;
    validate_selector(&config.item_links.selector)?;

    if let Some(required) = &config.required {
        validate_selector(required)?;
    }

    for field in &config.fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "extract field name cannot be empty".to_string(),
            ));
        }
        if RESERVED_KEYS.contains(&field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "extract field name '{}' is reserved",
                field.name
            )));
        }
        validate_selector(&field.selector)?;
    }

    Ok(())
}

/// Checks that a CSS selector parses
pub(crate) fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}
