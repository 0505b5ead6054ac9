use crate::config::types::{
    Config, CrawlerConfig, DownloadConfig, NotifyConfig, OutputConfig, RetryConfig, SourceConfig,
    UserAgentConfig,
};
use crate::download::is_forbidden_char;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config("retry.discovery", &config.retry.discovery)?;
    validate_retry_config("retry.processing", &config.retry.processing)?;
    validate_download_config(&config.download)?;
    validate_source_config(&config.source)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_notify_config(&config.notify)?;
    Ok(())
}

/// Validates crawl range and concurrency
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if let Some(end_page) = config.end_page {
        if end_page < config.start_page {
            return Err(ConfigError::Validation(format!(
                "end_page ({}) must not be before start_page ({})",
                end_page, config.start_page
            )));
        }
    }

    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.max_concurrent_sessions < 1 || config.max_concurrent_sessions > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_sessions must be between 1 and 100, got {}",
            config.max_concurrent_sessions
        )));
    }

    Ok(())
}

/// Validates one retry policy
fn validate_retry_config(section: &str, config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.max_attempts must be >= 1",
            section
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "{}: min_delay_ms ({}) exceeds max_delay_ms ({})",
            section, config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.refresh_every == Some(0) {
        return Err(ConfigError::Validation(format!(
            "{}.refresh_every must be >= 1 when set",
            section
        )));
    }

    Ok(())
}

/// Validates the download-commit pipeline settings
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.output_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "download.max_attempts must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_downloads must be between 1 and 100, got {}",
            config.max_concurrent_downloads
        )));
    }

    if is_forbidden_char(config.placeholder) {
        return Err(ConfigError::Validation(format!(
            "placeholder '{}' is itself not allowed in file names",
            config.placeholder.escape_default()
        )));
    }

    let fallback = config.fallback_name.trim();
    if fallback.is_empty() || fallback == "." || fallback == ".." {
        return Err(ConfigError::Validation(
            "fallback_name must be a usable file name".to_string(),
        ));
    }

    if config.fallback_name.chars().any(is_forbidden_char) {
        return Err(ConfigError::Validation(format!(
            "fallback_name '{}' contains characters not allowed in file names",
            config.fallback_name
        )));
    }

    if config.keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "download keywords cannot be empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates the catalog source settings
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if !config.listing_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing_url must contain a {{page}} placeholder, got '{}'",
            config.listing_url
        )));
    }

    let sample = config.listing_url.replace("{page}", "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "listing_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    validate_selector(&config.record_selector)?;
    validate_selector(&config.document_selector)?;
    for selector in [
        &config.listing_ready_selector,
        &config.record_ready_selector,
        &config.document_name_selector,
    ]
    .into_iter()
    .flatten()
    {
        validate_selector(selector)?;
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
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

    if config.report_path.is_empty() {
        return Err(ConfigError::Validation(
            "report_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.summary_path, Some(p) if p.is_empty()) {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the optional notifier
fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if let Some(webhook) = &config.webhook_url {
        Url::parse(webhook)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webhook_url: {}", e)))?;
    }
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
