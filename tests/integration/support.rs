//! Shared fixtures: a recording fake browser and test configuration

use async_trait::async_trait;
use site_harvest::browser::{Browser, BrowserContext, BrowserPage, PageSnapshot, RenderError};
use site_harvest::config::{
    BrowserConfig, ClassifierConfig, Config, CrawlerConfig, DispatchConfig, StoreBackend,
    StoreConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct FakeState {
    pages: Mutex<HashMap<String, String>>,
    renders: Mutex<Vec<String>>,
    delay: Duration,
    fail_launch: bool,
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
}

/// Serves canned HTML by URL path and records every navigation
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every navigation takes `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            state: Arc::new(FakeState {
                delay,
                ..Default::default()
            }),
        }
    }

    /// A browser that cannot be launched
    pub fn broken() -> Self {
        Self {
            state: Arc::new(FakeState {
                fail_launch: true,
                ..Default::default()
            }),
        }
    }

    pub fn add_page(&self, path: &str, html: impl Into<String>) {
        self.state
            .pages
            .lock()
            .unwrap()
            .insert(path.to_string(), html.into());
    }

    /// Paths navigated to, in order
    pub fn renders(&self) -> Vec<String> {
        self.state.renders.lock().unwrap().clone()
    }

    pub fn sorted_renders(&self) -> Vec<String> {
        let mut renders = self.renders();
        renders.sort();
        renders
    }

    pub fn render_count(&self, path: &str) -> usize {
        self.renders().iter().filter(|p| *p == path).count()
    }

    pub fn contexts(&self) -> (usize, usize) {
        (
            self.state.contexts_opened.load(Ordering::SeqCst),
            self.state.contexts_closed.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError> {
        if self.state.fail_launch {
            return Err(RenderError::Launch("no chrome in test".to_string()));
        }
        self.state.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            state: self.state.clone(),
        }))
    }
}

struct FakeContext {
    state: Arc<FakeState>,
}

#[async_trait]
impl BrowserContext for FakeContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, RenderError> {
        Ok(Box::new(FakePage {
            state: self.state.clone(),
            last: None,
        }))
    }

    async fn close(&mut self) {
        self.state.contexts_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakePage {
    state: Arc<FakeState>,
    last: Option<PageSnapshot>,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot, RenderError> {
        let parsed = Url::parse(url).map_err(|e| RenderError::Navigation(e.to_string()))?;
        let path = parsed.path().to_string();
        self.state.renders.lock().unwrap().push(path.clone());

        if !self.state.delay.is_zero() {
            tokio::time::sleep(self.state.delay).await;
        }

        let html = self.state.pages.lock().unwrap().get(&path).cloned();
        match html {
            Some(html) => {
                let snapshot = PageSnapshot {
                    html,
                    title: None,
                    final_url: Some(url.to_string()),
                };
                self.last = Some(snapshot.clone());
                Ok(snapshot)
            }
            None => Err(RenderError::Navigation(
                "net::ERR_HTTP_RESPONSE_CODE_FAILURE".to_string(),
            )),
        }
    }

    async fn wait_for_idle(&mut self) -> Result<PageSnapshot, RenderError> {
        self.last.clone().ok_or(RenderError::Timeout("network idle"))
    }

    async fn close(&mut self) {}
}

/// A page whose body links to `links`
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">{}</a>", href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><nav>Menu</nav><main><h1>{}</h1><p>Welcome to {}.</p>{}</main></body></html>",
        title, title, title, anchors
    )
}

/// Answers every GET probe with an HTML content type
pub async fn mount_html_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Probe</title></head><body></body></html>",
            "text/html",
        ))
        .mount(server)
        .await;
}

pub fn test_config(max_depth: u32, max_pages: usize) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth,
            max_pages_per_website: max_pages,
            workers_per_site: 4,
            batch_size: 2,
            max_retries: 1,
            fetch_timeout_ms: 2_000,
            idle_timeout_ms: 200,
            site_timeout_secs: 30,
            settle_window_ms: 20,
            ..CrawlerConfig::default()
        },
        classifier: ClassifierConfig {
            probe_timeout_ms: 2_000,
            rate_limit_delay_ms: 1,
            ..ClassifierConfig::default()
        },
        dispatch: DispatchConfig {
            execution_units: 2,
            job_poll_timeout_ms: 50,
        },
        store: StoreConfig {
            backend: StoreBackend::Sqlite,
            endpoint: None,
            index: None,
            api_key: None,
            database_path: None,
            max_retries: 2,
            retry_delay_ms: 1,
            request_timeout_secs: 5,
        },
        browser: BrowserConfig::default(),
    }
}
