//! Per-site and per-run crawl summaries

use crate::crawler::{DispatchReport, SiteOutcome, SiteReport};
use crate::state::CrawlStats;
use std::fmt::Write;
use std::time::Duration;
use tracing::info;

/// Logs the statistics of a finished site
pub fn log_site_report(report: &SiteReport) {
    let stats = &report.stats;
    info!(
        business_id = %report.business_id,
        website = %report.website,
        outcome = report.outcome.as_str(),
        total_secs = report.elapsed.as_secs_f64(),
        crawled = stats.crawled,
        discovered = stats.discovered,
        failed = stats.failed,
        skipped = stats.skipped,
        new = stats.new_pages,
        changed = stats.changed_pages,
        unchanged = stats.unchanged_pages,
        avg_secs_per_page = average_per_page(report.elapsed, stats.crawled),
        "Site finished"
    );
}

fn average_per_page(elapsed: Duration, crawled: usize) -> f64 {
    if crawled == 0 {
        0.0
    } else {
        elapsed.as_secs_f64() / crawled as f64
    }
}

/// Totals over every site of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub sites: usize,
    pub drained: usize,
    pub timed_out: usize,
    pub shut_down: usize,
    pub failed_units: usize,
    pub abandoned: usize,
    pub totals: CrawlStats,
}

impl RunSummary {
    /// Aggregates a dispatch report
    pub fn from_report(report: &DispatchReport) -> Self {
        let mut summary = Self {
            sites: report.sites.len(),
            failed_units: report.failed_units.len(),
            abandoned: report.abandoned,
            ..Default::default()
        };

        for site in &report.sites {
            match site.outcome {
                SiteOutcome::Drained => summary.drained += 1,
                SiteOutcome::TimedOut => summary.timed_out += 1,
                SiteOutcome::ShutdownRequested => summary.shut_down += 1,
            }
            summary.totals.merge(&site.stats);
        }

        summary
    }

    /// Percentage of crawled URLs that did not fail
    pub fn success_rate(&self) -> f64 {
        if self.totals.crawled == 0 {
            return 0.0;
        }
        let succeeded = self.totals.crawled.saturating_sub(self.totals.failed);
        (succeeded as f64 / self.totals.crawled as f64) * 100.0
    }
}

/// Renders the run summary as plain text
///
/// # Arguments
///
/// * `report` - The finished dispatch report
///
/// # Returns
///
/// A multi-line table: run totals, then one row per site
pub fn format_summary(report: &DispatchReport) -> String {
    let summary = RunSummary::from_report(report);
    let totals = &summary.totals;
    let mut out = String::new();

    let _ = writeln!(out, "=== Harvest Summary ===\n");
    let _ = writeln!(out, "Sites:");
    let _ = writeln!(out, "  Crawled: {}", summary.sites);
    let _ = writeln!(out, "  Drained: {}", summary.drained);
    let _ = writeln!(out, "  Timed out: {}", summary.timed_out);
    let _ = writeln!(out, "  Stopped by shutdown: {}", summary.shut_down);
    if summary.failed_units > 0 {
        let _ = writeln!(out, "  Failed execution units: {}", summary.failed_units);
    }
    if summary.abandoned > 0 {
        let _ = writeln!(out, "  Never started: {}", summary.abandoned);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Pages:");
    let _ = writeln!(out, "  Discovered: {}", totals.discovered);
    let _ = writeln!(out, "  Crawled: {}", totals.crawled);
    let _ = writeln!(out, "  Rendered: {}", totals.rendered);
    let _ = writeln!(out, "  Failed: {}", totals.failed);
    let _ = writeln!(out, "  Skipped: {}", totals.skipped);
    let _ = writeln!(
        out,
        "  New / changed / unchanged: {} / {} / {}",
        totals.new_pages, totals.changed_pages, totals.unchanged_pages
    );
    if totals.dropped_updates > 0 {
        let _ = writeln!(out, "  Dropped store updates: {}", totals.dropped_updates);
    }
    let _ = writeln!(out);

    if !report.sites.is_empty() {
        let _ = writeln!(
            out,
            "{:<20} {:<10} {:>8} {:>10} {:>7} {:>9}",
            "Business", "Outcome", "Crawled", "Discovered", "Failed", "Time (s)"
        );
        let mut sites: Vec<&SiteReport> = report.sites.iter().collect();
        sites.sort_by(|a, b| a.business_id.cmp(&b.business_id));
        for site in sites {
            let _ = writeln!(
                out,
                "{:<20} {:<10} {:>8} {:>10} {:>7} {:>9.1}",
                site.business_id,
                site.outcome.as_str(),
                site.stats.crawled,
                site.stats.discovered,
                site.stats.failed,
                site.elapsed.as_secs_f64()
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "Success Rate: {:.1}% ({} / {} URLs without failure)",
        summary.success_rate(),
        totals.crawled.saturating_sub(totals.failed),
        totals.crawled
    );
    out
}

/// Prints the run summary to stdout
pub fn print_summary(report: &DispatchReport) {
    print!("{}", format_summary(report));
}
