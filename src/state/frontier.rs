//! Breadth-first work queue for one site
//!
//! The frontier hands out batches of URLs together with their depth. It
//! remembers every fingerprint it has ever accepted, so a URL discovered
//! from several parents is queued once, and it enforces both the depth
//! ceiling and the page ceiling at enqueue time.

use crate::url::url_fingerprint;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A group of same-depth URLs handed to one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBatch {
    pub urls: Vec<Url>,
    pub depth: u32,
}

/// Queue of pending batches plus the discovered-URL bookkeeping
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<UrlBatch>,
    queued: HashSet<String>,
    discovered: usize,
    max_depth: u32,
    max_pages: usize,
    batch_size: usize,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Deepest depth that may be enqueued
    /// * `max_pages` - Page ceiling: the most URLs ever accepted
    /// * `batch_size` - URLs per queued batch
    pub fn new(max_depth: u32, max_pages: usize, batch_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            discovered: 0,
            max_depth,
            max_pages,
            batch_size: batch_size.max(1),
        }
    }

    /// Enqueues the start URL at depth 0
    ///
    /// Returns false if the page ceiling is zero.
    pub fn seed(&mut self, url: Url) -> bool {
        self.enqueue(std::iter::once(url), 0) == 1
    }

    /// Accepts new URLs at `depth`
    ///
    /// URLs already accepted earlier are ignored. Nothing is accepted past
    /// the depth ceiling, and acceptance stops once the page ceiling is
    /// reached.
    ///
    /// # Returns
    ///
    /// The number of URLs accepted
    pub fn enqueue<I>(&mut self, urls: I, depth: u32) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        if depth > self.max_depth {
            return 0;
        }

        let mut accepted = Vec::new();
        for url in urls {
            if self.at_page_ceiling() {
                break;
            }
            if self.queued.insert(url_fingerprint(&url)) {
                self.discovered += 1;
                accepted.push(url);
            }
        }

        let count = accepted.len();
        let mut urls = accepted.into_iter().peekable();
        while urls.peek().is_some() {
            let batch: Vec<Url> = urls.by_ref().take(self.batch_size).collect();
            self.queue.push_back(UrlBatch { urls: batch, depth });
        }
        count
    }

    /// Takes the oldest pending batch
    pub fn pop(&mut self) -> Option<UrlBatch> {
        self.queue.pop_front()
    }

    /// Total URLs accepted so far, including the seed
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    pub fn at_page_ceiling(&self) -> bool {
        self.discovered >= self.max_pages
    }

    /// Returns true if URLs found at `depth` may still be enqueued
    pub fn accepts_children_of(&self, depth: u32) -> bool {
        depth < self.max_depth && !self.at_page_ceiling()
    }
}
