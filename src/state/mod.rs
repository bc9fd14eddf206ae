//! Per-site crawl state
//!
//! Everything in this module is owned by exactly one site controller and
//! shared only between that site's page workers:
//!
//! - `VisitedSet`: URL fingerprints claimed for fetching
//! - `Frontier`: the (batch, depth) work queue and the discovered count
//! - `CrawlCounters` / `CrawlStats`: live counters and their snapshot

mod frontier;
mod stats;
mod visited;

pub use frontier::{Frontier, UrlBatch};
pub use stats::{CrawlCounters, CrawlStats};
pub use visited::VisitedSet;
