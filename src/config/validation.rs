use crate::config::types::{Config, CrawlerConfig, SeedConfig, SourceConfig, PAGE_ID_PLACEHOLDER};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Largest shift that keeps `2^exponent` seconds inside an `i64` timestamp delta
const MAX_CAP_EXPONENT: u32 = 62;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    validate_crawler_config(&config.crawler)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be > 0".to_string(),
        ));
    }

    if config.recrawl_every_secs == 0 {
        return Err(ConfigError::Validation(
            "recrawl_every_secs must be > 0".to_string(),
        ));
    }

    if config.max_backoff_secs == 0 {
        return Err(ConfigError::Validation(
            "max_backoff_secs must be > 0".to_string(),
        ));
    }

    if config.backoff_cap_exponent > MAX_CAP_EXPONENT {
        return Err(ConfigError::Validation(format!(
            "backoff_cap_exponent must be <= {}, got {}",
            MAX_CAP_EXPONENT, config.backoff_cap_exponent
        )));
    }

    Ok(())
}

/// Validates source entries and their seeders
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source name '{}'",
                source.name
            )));
        }

        match &source.seed {
            SeedConfig::SeedFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Source '{}' has an empty seed file path",
                        source.name
                    )));
                }
            }
            SeedConfig::WikiCategory {
                api,
                category,
                page_url_pattern,
                ..
            } => {
                validate_http_url(api, &source.name)?;

                if category.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Source '{}' has an empty category",
                        source.name
                    )));
                }

                if !page_url_pattern.contains(PAGE_ID_PLACEHOLDER) {
                    return Err(ConfigError::Validation(format!(
                        "Source '{}': page-url-pattern must contain {}",
                        source.name, PAGE_ID_PLACEHOLDER
                    )));
                }

                validate_http_url(
                    &page_url_pattern.replace(PAGE_ID_PLACEHOLDER, "1"),
                    &source.name,
                )?;
            }
        }
    }

    Ok(())
}

fn validate_http_url(raw: &str, source_name: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Source '{}': invalid URL '{}': {}",
            source_name, raw, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Source '{}': URL '{}' must use http or https",
            source_name, raw
        )));
    }

    Ok(())
}
