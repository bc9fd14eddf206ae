//! Dispatch layer: a fixed pool of execution units over a shared job queue
//!
//! Each unit is a tokio task that pulls one provider at a time, runs the
//! site controller to a terminal state and pulls again. A unit exits when
//! the queue stays empty for the poll timeout, when the global shutdown
//! signal is raised, or when its browser cannot be launched.

use crate::browser::Browser;
use crate::config::Config;
use crate::crawler::controller::{SiteCrawler, SiteReport};
use crate::output::log_site_report;
use crate::provider::{CrawlJob, Provider};
use crate::storage::{DocumentStore, UpsertPipeline};
use crate::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// An execution unit that stopped because of a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: usize,

    /// The provider being crawled when the unit failed
    pub business_id: Option<String>,

    pub error: String,
}

/// Result of a whole dispatch run
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// One report per site that reached a terminal state
    pub sites: Vec<SiteReport>,

    pub failed_units: Vec<UnitFailure>,

    /// Providers still queued when every unit had exited
    pub abandoned: usize,
}

/// Raises the global shutdown signal
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks every unit and site to stop; running fetches may finish
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// What one unit produced before exiting
struct UnitResult {
    reports: Vec<SiteReport>,
    failure: Option<UnitFailure>,
}

/// Work shared by all execution units of one run
struct JobQueue {
    jobs: Mutex<mpsc::UnboundedReceiver<CrawlJob>>,
    pending: AtomicUsize,
    all_done: Notify,
}

impl JobQueue {
    /// Pulls the next job, giving up after `timeout`
    async fn next(&self, timeout: Duration) -> Option<CrawlJob> {
        tokio::time::timeout(timeout, async { self.jobs.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.all_done.notify_waiters();
        }
    }

    /// Empties the queue, returning how many jobs were never started
    async fn drain(&self) -> usize {
        let mut jobs = self.jobs.lock().await;
        let mut count = 0;
        while jobs.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    fn is_done(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }
}

/// Runs site crawls for a list of providers
pub struct Dispatcher {
    config: Arc<Config>,
    crawler: SiteCrawler,
    shutdown: ShutdownHandle,
}

impl Dispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration, shared by every component
    /// * `browser` - Source of per-worker browser contexts
    /// * `store` - The document store receiving page records
    pub fn new(
        config: Arc<Config>,
        browser: Arc<dyn Browser>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let pipeline = UpsertPipeline::new(store, &config.store);
        let crawler = SiteCrawler::new(config.clone(), browser, pipeline);
        let (tx, _rx) = watch::channel(false);

        Self {
            config,
            crawler,
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        }
    }

    /// A handle that can stop the run from outside, e.g. on Ctrl-C
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Crawls every provider and returns once all units have exited
    ///
    /// Blocks until the job queue is drained, then raises the global
    /// shutdown signal and waits for the units.
    ///
    /// # Arguments
    ///
    /// * `providers` - The businesses to crawl
    pub async fn run(&self, providers: Vec<Provider>) -> DispatchReport {
        let job_count = providers.len();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for provider in providers {
            let _ = job_tx.send(CrawlJob::from(provider));
        }
        drop(job_tx);

        let queue = Arc::new(JobQueue {
            jobs: Mutex::new(job_rx),
            pending: AtomicUsize::new(job_count),
            all_done: Notify::new(),
        });

        let unit_count = self.config.dispatch.execution_units.max(1).min(job_count.max(1));
        let poll_timeout = Duration::from_millis(self.config.dispatch.job_poll_timeout_ms);
        info!(providers = job_count, units = unit_count, "Dispatching crawl jobs");

        let mut units = JoinSet::new();
        for unit in 0..unit_count {
            let crawler = self.crawler.clone();
            let queue = queue.clone();
            let shutdown = self.shutdown.tx.subscribe();
            units.spawn(run_unit(unit, crawler, queue, shutdown, poll_timeout));
        }

        let mut report = DispatchReport::default();

        // Join semantics: wait for every job to finish, not just to be taken.
        loop {
            let all_done = queue.all_done.notified();
            tokio::pin!(all_done);
            all_done.as_mut().enable();

            if queue.is_done() {
                break;
            }

            tokio::select! {
                _ = &mut all_done => {}
                joined = units.join_next() => match joined {
                    Some(joined) => collect_unit(&mut report, joined),
                    None => break,
                },
            }
        }

        debug!("Job queue drained, raising shutdown");
        self.shutdown.shutdown();

        while let Some(joined) = units.join_next().await {
            collect_unit(&mut report, joined);
        }

        report.abandoned = queue.drain().await;
        if report.abandoned > 0 {
            warn!(abandoned = report.abandoned, "Providers left in the queue");
        }

        report
    }
}

fn collect_unit(
    report: &mut DispatchReport,
    joined: std::result::Result<UnitResult, tokio::task::JoinError>,
) {
    match joined {
        Ok(result) => {
            report.sites.extend(result.reports);
            report.failed_units.extend(result.failure);
        }
        Err(e) => error!(error = %e, "Execution unit panicked"),
    }
}

async fn run_unit(
    unit: usize,
    crawler: SiteCrawler,
    queue: Arc<JobQueue>,
    shutdown: watch::Receiver<bool>,
    poll_timeout: Duration,
) -> UnitResult {
    let mut reports = Vec::new();

    loop {
        if *shutdown.borrow() {
            debug!(unit, "Shutdown raised, unit exiting");
            break;
        }

        let Some(job) = queue.next(poll_timeout).await else {
            debug!(unit, "Job queue empty, unit exiting");
            break;
        };

        let provider = job.provider;
        let result = crawler.run_site(&provider, shutdown.clone()).await;
        queue.complete();

        match result {
            Ok(site) => {
                log_site_report(&site);
                reports.push(site);
            }
            Err(e @ HarvestError::Browser(_)) => {
                error!(unit, business_id = %provider.business_id, error = %e, "Browser failure, unit exiting");
                return UnitResult {
                    reports,
                    failure: Some(UnitFailure {
                        unit,
                        business_id: Some(provider.business_id),
                        error: e.to_string(),
                    }),
                };
            }
            Err(e) => {
                warn!(unit, business_id = %provider.business_id, error = %e, "Site crawl failed");
            }
        }
    }

    UnitResult {
        reports,
        failure: None,
    }
}
