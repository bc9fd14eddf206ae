//! Crawler module: everything that happens to a URL and to a site
//!
//! - `classifier`: content-type probe deciding whether to render
//! - `links`: in-scope link discovery with extension filtering
//! - `fetcher`: two-phase browser fetch with bounded retries
//! - `content`: text, reference and fingerprint extraction
//! - `controller`: the per-site worker pool and its terminal states
//! - `dispatch`: execution units over the shared provider queue

pub mod classifier;
pub mod content;
mod controller;
mod dispatch;
pub mod fetcher;
pub mod links;

pub use classifier::{build_http_client, classify_url, UrlInfo, UrlKind};
pub use content::{content_fingerprint, decide_change, process_page, ChangeKind};
pub use controller::{SiteCrawler, SiteOutcome, SiteReport};
pub use dispatch::{DispatchReport, Dispatcher, ShutdownHandle, UnitFailure};
pub use fetcher::{fetch_page, FetchResult, FetchSettings};
pub use links::{extract_links, is_denied};
