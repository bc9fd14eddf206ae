use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Per-site crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URL (the seed is depth 0)
    pub max_depth: u32,

    /// Maximum number of URLs discovered (and therefore fetched) per website
    pub max_pages_per_website: usize,

    /// Number of concurrent page workers per site
    pub workers_per_site: usize,

    /// Number of URLs grouped into one queue entry
    pub batch_size: usize,

    /// Maximum render attempts per URL
    pub max_retries: u32,

    /// Bound on one navigation attempt (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Bound on the network-idle wait after the load event (milliseconds)
    pub idle_timeout_ms: u64,

    /// Wall-clock budget for one whole site (seconds)
    pub site_timeout_secs: u64,

    /// How long an idle worker waits before re-checking the queue (milliseconds)
    pub settle_window_ms: u64,

    /// Whether to consult robots.txt before fetching
    pub respect_robots: bool,

    /// Resource types aborted at the network layer while rendering
    pub blocked_resource_types: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages_per_website: 500,
            workers_per_site: 8,
            batch_size: 5,
            max_retries: 3,
            fetch_timeout_ms: 30_000,
            idle_timeout_ms: 5_000,
            site_timeout_secs: 1_800,
            settle_window_ms: 200,
            respect_robots: false,
            blocked_resource_types: vec![
                "image".to_string(),
                "media".to_string(),
                "font".to_string(),
            ],
        }
    }
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn site_timeout(&self) -> Duration {
        Duration::from_secs(self.site_timeout_secs)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

/// Lightweight content-type probe settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClassifierConfig {
    /// Timeout for one probe request (milliseconds)
    pub probe_timeout_ms: u64,

    /// How many times a 429 response is retried
    pub rate_limit_retries: u32,

    /// Fixed delay between 429 retries (milliseconds)
    pub rate_limit_delay_ms: u64,

    /// Maximum number of body bytes read to find an HTML title
    pub title_read_limit: usize,

    /// User agent sent with probe requests
    pub user_agent: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            rate_limit_retries: 3,
            rate_limit_delay_ms: 2_000,
            title_read_limit: 64 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Execution unit pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatchConfig {
    /// Number of sites crawled in parallel
    pub execution_units: usize,

    /// How long a unit waits on an empty job queue before exiting (milliseconds)
    pub job_poll_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            execution_units: 4,
            job_poll_timeout_ms: 1_000,
        }
    }
}

/// Which document store receives the page records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Elasticsearch,
    Sqlite,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Elasticsearch base URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Elasticsearch index holding one document per business
    #[serde(default)]
    pub index: Option<String>,

    /// Elasticsearch API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// SQLite database file
    #[serde(default)]
    pub database_path: Option<String>,

    /// Attempts per page update before it is dropped
    #[serde(default = "default_store_retries")]
    pub max_retries: u32,

    /// Delay between update attempts (milliseconds)
    #[serde(default = "default_store_retry_delay")]
    pub retry_delay_ms: u64,

    /// Timeout for one store request (seconds)
    #[serde(default = "default_store_timeout")]
    pub request_timeout_secs: u64,
}

fn default_store_retries() -> u32 {
    5
}

fn default_store_retry_delay() -> u64 {
    500
}

fn default_store_timeout() -> u64 {
    60
}

/// Headless Chrome launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrowserConfig {
    /// Path to a Chrome/Chromium binary (auto-detected when absent)
    pub executable: Option<String>,

    /// Connect to an already running Chrome instead of launching one
    pub remote_debugging_url: Option<String>,

    pub headless: bool,

    /// Additional command line switches for launched browsers
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            remote_debugging_url: None,
            headless: true,
            extra_args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}
