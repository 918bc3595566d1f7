use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, ProxyEntry, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use chrono::NaiveDate;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_proxies(&config.proxies)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.artifact_root.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_root cannot be empty".to_string(),
        ));
    }

    if config.fetch_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.max_concurrent_sources < 1 || config.max_concurrent_sources > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_sources must be between 1 and 64, got {}",
            config.max_concurrent_sources
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

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the proxy pool
fn validate_proxies(proxies: &[ProxyEntry]) -> Result<(), ConfigError> {
    for proxy in proxies {
        if proxy.host.is_empty() {
            return Err(ConfigError::Validation(
                "proxy host cannot be empty".to_string(),
            ));
        }
        if proxy.port == 0 {
            return Err(ConfigError::Validation(format!(
                "proxy '{}' must have a non-zero port",
                proxy.host
            )));
        }
    }
    Ok(())
}

/// Validates every source entry
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in sources {
        if source.id.is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        NaiveDate::parse_from_str(&source.seed_watermark, &source.date_format).map_err(|e| {
            ConfigError::Validation(format!(
                "source '{}': seed_watermark '{}' does not match date_format '{}': {}",
                source.id, source.seed_watermark, source.date_format, e
            ))
        })?;

        validate_templated_url(&source.id, "listing_url", &source.listing_url)?;

        match (&source.result_limit, &source.count_url) {
            (Some(0), _) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}': result_limit must be greater than 0",
                    source.id
                )));
            }
            (Some(_), None) => {
                return Err(ConfigError::Validation(format!(
                    "source '{}': result_limit requires a count_url",
                    source.id
                )));
            }
            (_, Some(count_url)) => {
                validate_templated_url(&source.id, "count_url", count_url)?;
            }
            (None, None) => {}
        }

        if source.key_fields.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must declare at least one key field",
                source.id
            )));
        }

        if source.artifact_extension.is_empty()
            || !source
                .artifact_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Validation(format!(
                "source '{}': artifact_extension must be alphanumeric, got '{}'",
                source.id, source.artifact_extension
            )));
        }
    }

    Ok(())
}

/// A templated URL must carry both placeholders and parse once they are filled in
fn validate_templated_url(source_id: &str, field: &str, template: &str) -> Result<(), ConfigError> {
    if !template.contains("{start}") || !template.contains("{end}") {
        return Err(ConfigError::Validation(format!(
            "source '{}': {} must contain {{start}} and {{end}} placeholders",
            source_id, field
        )));
    }

    let filled = template
        .replace("{start}", "2024-01-01")
        .replace("{end}", "2024-01-31");
    Url::parse(&filled).map_err(|e| {
        ConfigError::InvalidUrl(format!("source '{}': invalid {}: {}", source_id, field, e))
    })?;

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
