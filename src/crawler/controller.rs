//! Per-site crawl controller
//!
//! A site moves through `Seeded -> Running -> {Drained | TimedOut |
//! ShutdownRequested}`. While running, a fixed pool of page workers pulls
//! (batch, depth) units from the site's frontier. Each worker owns one
//! browser context and one HTTP session for its whole life; the URLs of a
//! batch are processed concurrently on the worker's own task.
//!
//! Drain detection uses an outstanding-work counter: it grows under the
//! frontier lock whenever URLs are accepted and shrinks once a URL has been
//! fully processed. The site is drained when it reaches zero.

use crate::browser::{Browser, BrowserContext, RenderError};
use crate::config::Config;
use crate::crawler::classifier::{build_http_client, classify_url, UrlKind};
use crate::crawler::content::process_page;
use crate::crawler::fetcher::{fetch_page, FetchResult, FetchSettings};
use crate::crawler::links::extract_links;
use crate::provider::Provider;
use crate::robots::{fetch_robots, ParsedRobots, ROBOTS_AGENT};
use crate::state::{CrawlCounters, CrawlStats, Frontier, UrlBatch, VisitedSet};
use crate::storage::UpsertPipeline;
use crate::url::{url_fingerprint, SiteScope};
use crate::{HarvestError, Result};
use futures::future::join_all;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Notify, OnceCell};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Terminal state of one site crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteOutcome {
    /// Every discovered URL was processed
    Drained,

    /// The per-site wall-clock budget ran out
    TimedOut,

    /// The global shutdown signal was raised
    ShutdownRequested,
}

impl SiteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drained => "drained",
            Self::TimedOut => "timed out",
            Self::ShutdownRequested => "shutdown",
        }
    }
}

/// What happened to one site
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub business_id: String,
    pub website: String,
    pub outcome: SiteOutcome,
    pub stats: CrawlStats,
    pub elapsed: Duration,
}

/// State shared by the workers of one site and by nobody else
struct SiteState {
    provider: Provider,
    seed: Url,
    scope: SiteScope,
    frontier: Mutex<Frontier>,
    visited: VisitedSet,
    counters: CrawlCounters,
    outstanding: AtomicUsize,
    progress: Notify,
    robots: OnceCell<ParsedRobots>,
    stop: watch::Receiver<bool>,
}

impl SiteState {
    fn stopping(&self) -> bool {
        *self.stop.borrow()
    }

    fn is_drained(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) == 0
    }

    /// Accepts newly discovered URLs and wakes idle workers
    async fn enqueue(&self, urls: Vec<Url>, depth: u32) -> usize {
        let accepted = {
            let mut frontier = self.frontier.lock().await;
            let accepted = frontier.enqueue(urls, depth);
            self.outstanding.fetch_add(accepted, Ordering::SeqCst);
            self.counters.set_discovered(frontier.discovered());
            accepted
        };

        if accepted > 0 {
            self.progress.notify_waiters();
        }
        accepted
    }

    /// Returns true while links found at `depth` may still be enqueued
    async fn accepts_children_of(&self, depth: u32) -> bool {
        self.frontier.lock().await.accepts_children_of(depth)
    }

    /// Marks one URL as fully processed
    fn finish_url(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.progress.notify_waiters();
        }
    }
}

/// Resources owned by exactly one page worker
struct WorkerSession {
    browser: Arc<dyn Browser>,
    context: Option<Box<dyn BrowserContext>>,
    client: Client,
}

impl WorkerSession {
    /// Returns the worker's browser context, launching it on first use
    async fn open(&mut self) -> std::result::Result<(&dyn BrowserContext, &Client), RenderError> {
        if self.context.is_none() {
            self.context = Some(self.browser.new_context().await?);
        }

        match self.context.as_deref() {
            Some(context) => Ok((context, &self.client)),
            None => Err(RenderError::Launch("browser context unavailable".to_string())),
        }
    }

    async fn close(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.close().await;
        }
    }
}

/// Crawls one business website at a time
#[derive(Clone)]
pub struct SiteCrawler {
    config: Arc<Config>,
    browser: Arc<dyn Browser>,
    pipeline: UpsertPipeline,
    settings: FetchSettings,
}

impl SiteCrawler {
    /// Creates a crawler that renders with `browser` and writes through `pipeline`
    pub fn new(config: Arc<Config>, browser: Arc<dyn Browser>, pipeline: UpsertPipeline) -> Self {
        let settings = FetchSettings::from(&config.crawler);
        Self {
            config,
            browser,
            pipeline,
            settings,
        }
    }

    /// Crawls one provider's website to a terminal state
    ///
    /// Page-level failures never end the crawl. Only a browser that cannot
    /// be launched is returned as an error; pages stored before that stay
    /// stored.
    ///
    /// # Arguments
    ///
    /// * `provider` - The business to crawl
    /// * `shutdown` - Global shutdown signal
    ///
    /// # Returns
    ///
    /// * `Ok(SiteReport)` - The site reached a terminal state
    /// * `Err(HarvestError)` - The seed was unusable or the browser failed
    pub async fn run_site(
        &self,
        provider: &Provider,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SiteReport> {
        let started = Instant::now();
        let crawler = &self.config.crawler;

        let seed = provider.seed_url()?;
        let scope = SiteScope::from_seed(&seed)?;

        let mut frontier = Frontier::new(
            crawler.max_depth,
            crawler.max_pages_per_website,
            crawler.batch_size,
        );
        let seeded = frontier.seed(seed.clone());

        let counters = CrawlCounters::new();
        counters.set_discovered(frontier.discovered());

        let (stop_tx, stop_rx) = watch::channel(false);
        let site = Arc::new(SiteState {
            provider: provider.clone(),
            seed,
            scope,
            frontier: Mutex::new(frontier),
            visited: VisitedSet::new(),
            counters,
            outstanding: AtomicUsize::new(usize::from(seeded)),
            progress: Notify::new(),
            robots: OnceCell::new(),
            stop: stop_rx,
        });

        info!(
            business_id = %provider.business_id,
            website = %provider.website,
            site = %site.scope.site(),
            "Crawling site"
        );

        let mut workers = JoinSet::new();
        for worker in 0..crawler.workers_per_site.max(1) {
            let this = self.clone();
            let site = site.clone();
            workers.spawn(async move { this.run_worker(worker, site).await });
        }

        let deadline = tokio::time::sleep(crawler.site_timeout());
        tokio::pin!(deadline);

        let mut outcome = SiteOutcome::Drained;
        let mut stopping = false;
        let mut watch_shutdown = true;
        let mut fatal: Option<HarvestError> = None;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        error!(business_id = %provider.business_id, error = %e, "Page worker failed");
                        fatal.get_or_insert(e);
                        stopping = true;
                        stop_tx.send_replace(true);
                    }
                    Some(Err(e)) => {
                        error!(business_id = %provider.business_id, error = %e, "Page worker panicked");
                    }
                },
                _ = &mut deadline, if !stopping => {
                    warn!(
                        business_id = %provider.business_id,
                        timeout_secs = crawler.site_timeout_secs,
                        "Site timed out, stopping workers"
                    );
                    outcome = SiteOutcome::TimedOut;
                    stopping = true;
                    stop_tx.send_replace(true);
                }
                raised = shutdown_raised(&mut shutdown), if watch_shutdown && !stopping => {
                    watch_shutdown = false;
                    if raised {
                        info!(business_id = %provider.business_id, "Shutdown requested, stopping workers");
                        outcome = SiteOutcome::ShutdownRequested;
                        stopping = true;
                        stop_tx.send_replace(true);
                    }
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        Ok(SiteReport {
            business_id: provider.business_id.clone(),
            website: provider.website.clone(),
            outcome,
            stats: site.counters.snapshot(),
            elapsed: started.elapsed(),
        })
    }

    async fn run_worker(self, worker: usize, site: Arc<SiteState>) -> Result<()> {
        let client = build_http_client(&self.config.classifier)?;
        let mut session = WorkerSession {
            browser: self.browser.clone(),
            context: None,
            client,
        };

        let result = self.worker_loop(worker, &site, &mut session).await;
        session.close().await;

        trace!(business_id = %site.provider.business_id, worker, "Page worker exited");
        result
    }

    async fn worker_loop(
        &self,
        worker: usize,
        site: &SiteState,
        session: &mut WorkerSession,
    ) -> Result<()> {
        let settle_window = self.config.crawler.settle_window();
        let mut stop = site.stop.clone();

        loop {
            if site.stopping() {
                break;
            }

            let progress = site.progress.notified();
            tokio::pin!(progress);
            progress.as_mut().enable();

            let next = site.frontier.lock().await.pop();
            match next {
                Some(batch) => self.process_batch(worker, site, session, batch).await?,
                None if site.is_drained() => break,
                None => {
                    tokio::select! {
                        _ = &mut progress => {}
                        _ = tokio::time::sleep(settle_window) => {}
                        _ = stop.changed() => {}
                    }
                }
            }
        }

        Ok(())
    }

    async fn process_batch(
        &self,
        worker: usize,
        site: &SiteState,
        session: &mut WorkerSession,
        batch: UrlBatch,
    ) -> Result<()> {
        let UrlBatch { urls, depth } = batch;
        debug!(
            business_id = %site.provider.business_id,
            worker,
            depth,
            urls = urls.len(),
            "Processing batch"
        );

        let (context, client) = match session.open().await {
            Ok(parts) => parts,
            Err(e) => {
                for _ in &urls {
                    site.finish_url();
                }
                return Err(e.into());
            }
        };

        join_all(urls.into_iter().map(|url| async move {
            self.process_url(site, context, client, &url, depth).await;
            site.finish_url();
        }))
        .await;

        Ok(())
    }

    /// Visits one URL: claim, classify, render, extract, store
    async fn process_url(
        &self,
        site: &SiteState,
        context: &dyn BrowserContext,
        client: &Client,
        url: &Url,
        depth: u32,
    ) {
        if !site.visited.insert(&url_fingerprint(url)) {
            trace!(url = %url, "Already visited");
            return;
        }

        if self.config.crawler.respect_robots {
            let robots = site
                .robots
                .get_or_init(|| fetch_robots(client, &site.seed))
                .await;
            if !robots.is_allowed(url, ROBOTS_AGENT) {
                debug!(url = %url, "Disallowed by robots.txt");
                site.counters.record_skipped();
                site.counters.record_crawled(depth);
                return;
            }
        }

        let info = classify_url(client, url, &self.config.classifier).await;
        match info.kind {
            UrlKind::Html => self.render(site, context, url, info.title, depth).await,
            UrlKind::Error => {
                site.counters.record_failed();
                self.placeholder(site, url).await;
            }
            kind => {
                debug!(url = %url, ?kind, "Not HTML, skipping render");
                site.counters.record_skipped();
                self.placeholder(site, url).await;
            }
        }

        site.counters.record_crawled(depth);
    }

    async fn render(
        &self,
        site: &SiteState,
        context: &dyn BrowserContext,
        url: &Url,
        probe_title: Option<String>,
        depth: u32,
    ) {
        match fetch_page(context, url, &self.settings).await {
            FetchResult::Rendered {
                snapshot,
                settled,
                attempts,
            } => {
                site.counters.record_rendered();
                trace!(url = %url, depth, settled, attempts, "Rendered");

                if site.accepts_children_of(depth).await {
                    let base = snapshot
                        .final_url
                        .as_deref()
                        .and_then(|u| Url::parse(u).ok())
                        .unwrap_or_else(|| url.clone());
                    let links: Vec<Url> = extract_links(&snapshot.html, &base, &site.scope)
                        .into_iter()
                        .filter(|link| !site.visited.contains(&url_fingerprint(link)))
                        .collect();
                    let found = links.len();
                    let accepted = site.enqueue(links, depth + 1).await;
                    debug!(url = %url, depth, found, accepted, "Links enqueued");
                }

                let title = snapshot
                    .title
                    .filter(|title| !title.trim().is_empty())
                    .or(probe_title);
                let record = process_page(url, &snapshot.html, title, depth);
                let change = self.pipeline.upsert(&site.provider, &record).await;
                site.counters.record_upsert(change);
            }
            FetchResult::Failed { error, attempts } => {
                warn!(url = %url, depth, attempts, error = %error, "Fetch failed");
                site.counters.record_failed();
                self.placeholder(site, url).await;
            }
        }
    }

    async fn placeholder(&self, site: &SiteState, url: &Url) {
        if !self.pipeline.placeholder(&site.provider, url.as_str()).await {
            site.counters.record_upsert(None);
        }
    }
}

/// Resolves true once the signal is raised, false if its sender is gone
async fn shutdown_raised(shutdown: &mut watch::Receiver<bool>) -> bool {
    shutdown.wait_for(|stop| *stop).await.is_ok()
}
