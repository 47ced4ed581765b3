use crate::browser::Locator;
use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, OutputConfig, SchemaConfig, SiteConfig, MAX_WORKERS,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_site_config(&config.site)?;
    validate_schema_config(&config.schema)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1".to_string(),
        ));
    }

    if config.wait_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "wait_timeout_secs must be >= 1, got {}",
            config.wait_timeout_secs
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    Url::parse(&config.webdriver_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webdriver_url: {}", e)))?;

    if let Some(ref proxy) = config.proxy {
        if proxy.trim().is_empty() {
            return Err(ConfigError::Validation(
                "proxy cannot be empty when set".to_string(),
            ));
        }
    }

    if config.connect_attempts < 1 {
        return Err(ConfigError::Validation(
            "connect_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the listing URL and every locator
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.listing_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "listing_url '{}' must use http or https",
            config.listing_url
        )));
    }

    for (name, locator) in [
        ("rows", &config.rows),
        ("row_id_cell", &config.row_id_cell),
        ("listing", &config.listing),
        ("detail_content", &config.detail_content),
        ("loading", &config.loading),
        ("next_page", &config.next_page),
        ("previous_page", &config.previous_page),
        ("last_page", &config.last_page),
        ("next_block", &config.next_block),
        ("block_first_page", &config.block_first_page),
    ] {
        validate_locator(name, locator)?;
    }

    Ok(())
}

fn validate_locator(name: &str, locator: &Locator) -> Result<(), ConfigError> {
    if locator.expression().trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "locator '{}' cannot be empty",
            name
        )));
    }
    Ok(())
}

/// Validates the detail page schema
fn validate_schema_config(config: &SchemaConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("id_label", &config.id_label),
        ("certification_caption", &config.certification_caption),
        ("product_caption", &config.product_caption),
        ("factories_caption", &config.factories_caption),
        ("related_caption", &config.related_caption),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.log_directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "log_directory cannot be empty".to_string(),
        ));
    }

    if config.log_max_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "log_max_bytes must be >= 1024, got {}",
            config.log_max_bytes
        )));
    }

    Ok(())
}
