//! Crawl statistics for one site

use crate::crawler::ChangeKind;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Live counters shared by the workers of one site
#[derive(Debug, Default)]
pub struct CrawlCounters {
    discovered: AtomicUsize,
    crawled: AtomicUsize,
    rendered: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    new_pages: AtomicUsize,
    changed_pages: AtomicUsize,
    unchanged_pages: AtomicUsize,
    dropped_updates: AtomicUsize,
    deepest: AtomicU32,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the frontier's discovered total
    pub fn set_discovered(&self, discovered: usize) {
        self.discovered.store(discovered, Ordering::SeqCst);
    }

    /// A URL at `depth` was taken off the queue and processed to the end
    pub fn record_crawled(&self, depth: u32) {
        self.crawled.fetch_add(1, Ordering::SeqCst);
        self.deepest.fetch_max(depth, Ordering::SeqCst);
    }

    pub fn record_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::SeqCst);
    }

    /// Classification error or fetch failure
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Non-HTML URL or a URL disallowed by robots.txt
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    /// Outcome of one page write; `None` means the update was dropped
    pub fn record_upsert(&self, change: Option<ChangeKind>) {
        let counter = match change {
            Some(ChangeKind::New) => &self.new_pages,
            Some(ChangeKind::Changed) => &self.changed_pages,
            Some(ChangeKind::Unchanged) => &self.unchanged_pages,
            None => &self.dropped_updates,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Copies the current values
    pub fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            discovered: self.discovered.load(Ordering::SeqCst),
            crawled: self.crawled.load(Ordering::SeqCst),
            rendered: self.rendered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            new_pages: self.new_pages.load(Ordering::SeqCst),
            changed_pages: self.changed_pages.load(Ordering::SeqCst),
            unchanged_pages: self.unchanged_pages.load(Ordering::SeqCst),
            dropped_updates: self.dropped_updates.load(Ordering::SeqCst),
            deepest: self.deepest.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time statistics of a site crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// URLs accepted into the frontier, including the seed
    pub discovered: usize,

    /// URLs processed, whatever the outcome
    pub crawled: usize,

    /// URLs the browser rendered
    pub rendered: usize,

    pub failed: usize,
    pub skipped: usize,
    pub new_pages: usize,
    pub changed_pages: usize,
    pub unchanged_pages: usize,

    /// Page updates dropped after the store retries ran out
    pub dropped_updates: usize,

    /// Deepest depth crawled
    pub deepest: u32,
}

impl CrawlStats {
    /// Pages written to the store (new or changed)
    pub fn written(&self) -> usize {
        self.new_pages + self.changed_pages
    }

    /// Adds another site's statistics into this one
    pub fn merge(&mut self, other: &CrawlStats) {
        self.discovered += other.discovered;
        self.crawled += other.crawled;
        self.rendered += other.rendered;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.new_pages += other.new_pages;
        self.changed_pages += other.changed_pages;
        self.unchanged_pages += other.unchanged_pages;
        self.dropped_updates += other.dropped_updates;
        self.deepest = self.deepest.max(other.deepest);
    }
}
