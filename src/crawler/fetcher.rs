//! Browser fetch with the two-phase load protocol
//!
//! Each attempt opens its own page, navigates to the URL and waits for the
//! load event (phase 1), then waits for network idle (phase 2). The page is
//! closed after every attempt, whatever the outcome.

use crate::browser::{BrowserContext, BrowserPage, PageSnapshot, RenderError};
use crate::config::CrawlerConfig;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// The page loaded
    Rendered {
        /// Latest snapshot (post-idle when the page settled)
        snapshot: PageSnapshot,
        /// Whether the network-idle phase completed
        settled: bool,
        /// Attempts used, including the successful one
        attempts: u32,
    },

    /// Every attempt failed, or a non-recoverable abort stopped retrying
    Failed { error: String, attempts: u32 },
}

/// Timeouts and retry bound for page fetches
#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    pub max_retries: u32,
    pub fetch_timeout: Duration,
    pub idle_timeout: Duration,
}

impl From<&CrawlerConfig> for FetchSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            fetch_timeout: config.fetch_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Renders a URL in a fresh page of the worker's browser context
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Page could not be opened | Retry |
/// | Load event not reached in `fetch_timeout` | Retry from scratch |
/// | Navigation error | Retry from scratch |
/// | Navigation aborted by policy | Stop immediately |
/// | Network idle not reached in `idle_timeout` | Keep the phase-1 snapshot |
///
/// # Arguments
///
/// * `context` - The browser context owned by the calling worker
/// * `url` - The URL to render
/// * `settings` - Retry bound and timeouts
pub async fn fetch_page(
    context: &dyn BrowserContext,
    url: &Url,
    settings: &FetchSettings,
) -> FetchResult {
    let max_attempts = settings.max_retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let mut page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                debug!(url = %url, attempt, error = %e, "Failed to open page");
                last_error = e.to_string();
                continue;
            }
        };

        let result = render_once(page.as_mut(), url, settings).await;
        page.close().await;

        match result {
            Ok((snapshot, settled)) => {
                trace!(url = %url, attempt, settled, "Page rendered");
                return FetchResult::Rendered {
                    snapshot,
                    settled,
                    attempts: attempt,
                };
            }
            Err(e) if !e.is_retryable() => {
                debug!(url = %url, attempt, error = %e, "Navigation aborted, not retrying");
                return FetchResult::Failed {
                    error: e.to_string(),
                    attempts: attempt,
                };
            }
            Err(e) => {
                debug!(url = %url, attempt, error = %e, "Render attempt failed");
                last_error = e.to_string();
            }
        }
    }

    FetchResult::Failed {
        error: last_error,
        attempts: max_attempts,
    }
}

/// One attempt of the two-phase protocol
async fn render_once(
    page: &mut dyn BrowserPage,
    url: &Url,
    settings: &FetchSettings,
) -> Result<(PageSnapshot, bool), RenderError> {
    let loaded = tokio::time::timeout(settings.fetch_timeout, page.navigate(url.as_str()))
        .await
        .map_err(|_| RenderError::Timeout("load event"))??;

    match tokio::time::timeout(settings.idle_timeout, page.wait_for_idle()).await {
        Ok(Ok(settled)) => Ok((settled, true)),
        Ok(Err(e)) => {
            trace!(url = %url, error = %e, "Idle wait failed, keeping loaded content");
            Ok((loaded, false))
        }
        Err(_) => {
            trace!(url = %url, "Network idle timed out, keeping loaded content");
            Ok((loaded, false))
        }
    }
}
