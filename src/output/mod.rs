//! Output module for crawl reporting
//!
//! This module handles:
//! - Logging per-site statistics as each site finishes
//! - Aggregating a dispatch report into run totals
//! - Rendering the run summary table printed by the binary

mod summary;

pub use summary::{format_summary, log_site_report, print_summary, RunSummary};
