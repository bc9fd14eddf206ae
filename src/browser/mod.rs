//! Headless browser abstraction
//!
//! The crawler only talks to these traits. A [`Browser`] hands out
//! contexts; each page worker owns exactly one [`BrowserContext`] for its
//! whole lifetime and opens one [`BrowserPage`] per URL.

mod chrome;

pub use chrome::ChromeBrowser;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the rendering layer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    Page(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The request was intercepted or aborted by policy; retrying cannot help
    #[error("Navigation aborted: {0}")]
    Aborted(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl RenderError {
    /// Returns true if another render attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Aborted(_))
    }

    /// Classifies a navigation error message reported by the browser
    pub fn from_navigation_message(message: String) -> Self {
        if message.contains("ERR_ABORTED") || message.contains("ERR_BLOCKED_BY_CLIENT") {
            Self::Aborted(message)
        } else {
            Self::Navigation(message)
        }
    }
}

/// Rendered state of a page at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Serialized DOM
    pub html: String,

    /// Document title, if the page has one
    pub title: Option<String>,

    /// URL after redirects
    pub final_url: Option<String>,
}

/// Source of isolated browser contexts
#[async_trait]
pub trait Browser: Send + Sync {
    /// Opens a new context that is owned by the caller until closed
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError>;
}

/// One isolated browser session owned by a single worker
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Opens a fresh page
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, RenderError>;

    /// Releases every resource held by the context
    async fn close(&mut self);
}

/// One tab, used for exactly one URL
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigates and waits for the document load event
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot, RenderError>;

    /// Waits until the network has been quiet, then snapshots again
    ///
    /// Callers bound this with their own timeout.
    async fn wait_for_idle(&mut self) -> Result<PageSnapshot, RenderError>;

    /// Closes the tab
    async fn close(&mut self);
}
