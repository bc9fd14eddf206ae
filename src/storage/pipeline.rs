//! Retrying front end of a document store
//!
//! Page writes are idempotent, so a transient failure is retried with the
//! same payload. When retries run out the single update is dropped and
//! logged; the crawl carries on.

use crate::config::StoreConfig;
use crate::crawler::ChangeKind;
use crate::provider::Provider;
use crate::storage::traits::{DocumentStore, StoreResult};
use crate::storage::PageRecord;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded-retry wrapper around a shared store
#[derive(Clone)]
pub struct UpsertPipeline {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl UpsertPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Writes one page
    ///
    /// # Returns
    ///
    /// * `Some(ChangeKind)` - The store accepted the write
    /// * `None` - The update was dropped after exhausting retries
    pub async fn upsert(&self, provider: &Provider, page: &PageRecord) -> Option<ChangeKind> {
        self.with_retries(provider, &page.url, || {
            self.store.upsert_page(provider, page)
        })
        .await
    }

    /// Records a content-less attempt for a URL that produced no page
    ///
    /// Returns false if the placeholder could not be written.
    pub async fn placeholder(&self, provider: &Provider, url: &str) -> bool {
        self.with_retries(provider, url, || self.store.ensure_document(provider))
            .await
            .is_some()
    }

    async fn with_retries<T, F, Fut>(
        &self,
        provider: &Provider,
        url: &str,
        mut operation: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Some(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    debug!(
                        business_id = %provider.business_id,
                        url = %url,
                        attempt,
                        error = %e,
                        "Transient store error, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!(
                        business_id = %provider.business_id,
                        url = %url,
                        attempt,
                        error = %e,
                        "Dropping store update"
                    );
                    return None;
                }
            }
        }
        None
    }
}
