//! Site-Harvest: a business website crawler
//!
//! This crate crawls the websites of a list of businesses with a headless
//! browser, normalizes every reachable page and merges the results into one
//! document per business in a shared document store.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod output;
pub mod provider;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use std::sync::Arc;
use thiserror::Error;

/// Main error type for Site-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::RenderError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid provider record: {0}")]
    Provider(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Site-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    DispatchReport, Dispatcher, ShutdownHandle, SiteCrawler, SiteOutcome, SiteReport,
};
pub use provider::{load_providers, CrawlJob, Provider};
pub use state::CrawlStats;
pub use storage::{DocumentStore, PageRecord};
pub use url::{url_fingerprint, SiteScope};

/// Builds a dispatcher backed by Chrome and the store named in the config
///
/// Use this instead of [`harvest`] when the caller needs a
/// [`ShutdownHandle`] before the run starts.
pub fn build_dispatcher(config: Config) -> Result<Dispatcher> {
    let store = storage::open_store(&config.store)?;
    let browser = Arc::new(browser::ChromeBrowser::with_blocked_resources(
        config.browser.clone(),
        config.crawler.blocked_resource_types.as_slice(),
    ));
    Ok(Dispatcher::new(Arc::new(config), browser, store))
}

/// Crawls every provider with a Chrome browser and the store named in the config
///
/// This is the library entry point. It opens the configured document
/// store, prepares a Chrome launcher, and returns once every provider has
/// reached a terminal state.
///
/// # Example
///
/// ```no_run
/// use site_harvest::config::load_config;
/// use site_harvest::{harvest, load_providers};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let providers = load_providers(Path::new("providers.json"))?;
/// let report = harvest(config, providers).await?;
/// println!("{} sites crawled", report.sites.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config, providers: Vec<Provider>) -> Result<DispatchReport> {
    let dispatcher = build_dispatcher(config)?;
    Ok(dispatcher.run(providers).await)
}
