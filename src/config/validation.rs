use crate::config::types::{
    BrowserConfig, ClassifierConfig, Config, CrawlerConfig, DispatchConfig, StoreBackend,
    StoreConfig,
};
use crate::ConfigError;
use url::Url;

/// Resource types understood by the browser's request interception
const KNOWN_RESOURCE_TYPES: &[&str] = &[
    "document",
    "stylesheet",
    "image",
    "media",
    "font",
    "script",
    "texttrack",
    "xhr",
    "fetch",
    "eventsource",
    "websocket",
    "manifest",
    "other",
];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_classifier_config(&config.classifier)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_store_config(&config.store)?;
    validate_browser_config(&config.browser)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers_per_site < 1 || config.workers_per_site > 64 {
        return Err(ConfigError::Validation(format!(
            "workers_per_site must be between 1 and 64, got {}",
            config.workers_per_site
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.max_pages_per_website < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_website must be >= 1, got {}",
            config.max_pages_per_website
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.fetch_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_ms must be >= 100ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    if config.site_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "site_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.settle_window_ms < 1 {
        return Err(ConfigError::Validation(
            "settle_window_ms must be >= 1".to_string(),
        ));
    }

    for kind in &config.blocked_resource_types {
        let lowered = kind.to_lowercase();
        if lowered == "document" {
            return Err(ConfigError::Validation(
                "blocked_resource_types cannot contain 'document'".to_string(),
            ));
        }
        if !KNOWN_RESOURCE_TYPES.contains(&lowered.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown resource type '{}' in blocked_resource_types",
                kind
            )));
        }
    }

    Ok(())
}

/// Validates classifier configuration
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.probe_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "probe_timeout_ms must be >= 100ms, got {}ms",
            config.probe_timeout_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates dispatch configuration
fn validate_dispatch_config(config: &DispatchConfig) -> Result<(), ConfigError> {
    if config.execution_units < 1 || config.execution_units > 256 {
        return Err(ConfigError::Validation(format!(
            "execution_units must be between 1 and 256, got {}",
            config.execution_units
        )));
    }

    Ok(())
}

/// Validates the store section for the selected backend
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config.backend {
        StoreBackend::Elasticsearch => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                ConfigError::Validation("elasticsearch store requires an endpoint".to_string())
            })?;
            let url = Url::parse(endpoint)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint: {}", e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "Store endpoint must be http(s), got '{}'",
                    endpoint
                )));
            }

            match config.index.as_deref() {
                Some(index) if !index.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::Validation(
                        "elasticsearch store requires an index".to_string(),
                    ))
                }
            }
        }
        StoreBackend::Sqlite => match config.database_path.as_deref() {
            Some(path) if !path.is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "sqlite store requires a database_path".to_string(),
                ))
            }
        },
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "store max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if let Some(remote) = &config.remote_debugging_url {
        Url::parse(remote).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid remote_debugging_url: {}", e))
        })?;
    }

    if let Some(executable) = &config.executable {
        if executable.trim().is_empty() {
            return Err(ConfigError::Validation(
                "executable cannot be an empty path".to_string(),
            ));
        }
    }

    Ok(())
}
