//! Chrome DevTools Protocol implementation of the browser traits

use super::{Browser, BrowserContext, BrowserPage, PageSnapshot, RenderError};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{BrowserConfig as CdpConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const NETWORK_IDLE: &str = "networkIdle";
const NAVIGATION_START: &str = "init";

/// Launches Chrome, or connects to a remote one, once per context
pub struct ChromeBrowser {
    config: BrowserConfig,
    blocked: Vec<ResourceType>,
}

impl ChromeBrowser {
    /// Creates a launcher that blocks the given resource types
    pub fn with_blocked_resources<S: AsRef<str>>(config: BrowserConfig, blocked: &[S]) -> Self {
        let blocked = blocked
            .iter()
            .filter_map(|kind| resource_type(kind.as_ref()))
            .collect();
        Self { config, blocked }
    }

    fn launch_config(&self) -> Result<CdpConfig, RenderError> {
        let mut builder = CdpConfig::builder()
            .no_sandbox()
            .request_timeout(Duration::from_secs(30));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &self.config.extra_args {
            builder = builder.arg(arg.as_str());
        }

        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn new_context(&self) -> Result<Box<dyn BrowserContext>, RenderError> {
        let (mut browser, mut handler) = match &self.config.remote_debugging_url {
            Some(url) => {
                debug!(url = %url, "Connecting to remote Chrome");
                chromiumoxide::Browser::connect(url.as_str())
                    .await
                    .map_err(|e| RenderError::Launch(e.to_string()))?
            }
            None => chromiumoxide::Browser::launch(self.launch_config()?)
                .await
                .map_err(|e| RenderError::Launch(e.to_string()))?,
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        // A shared remote browser gets one isolated context per worker.
        let ownership = if self.config.remote_debugging_url.is_some() {
            match browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
            {
                Ok(context_id) => Ownership::Connected { context_id },
                Err(e) => {
                    handler_task.abort();
                    return Err(RenderError::Launch(e.to_string()));
                }
            }
        } else {
            Ownership::Launched
        };

        Ok(Box::new(ChromeContext {
            browser,
            handler_task,
            ownership,
            blocked: self.blocked.clone(),
        }))
    }
}

/// How a context came by its browser
enum Ownership {
    /// The context started Chrome and shuts it down on close
    Launched,
    /// The browser is shared; only the isolated context is disposed
    Connected { context_id: BrowserContextId },
}

impl Ownership {
    fn target_params(&self) -> Result<CreateTargetParams, RenderError> {
        let mut builder = CreateTargetParams::builder().url("about:blank");
        if let Self::Connected { context_id } = self {
            builder = builder.browser_context_id(context_id.clone());
        }
        builder.build().map_err(RenderError::Page)
    }
}

struct ChromeContext {
    browser: chromiumoxide::Browser,
    handler_task: JoinHandle<()>,
    ownership: Ownership,
    blocked: Vec<ResourceType>,
}

#[async_trait]
impl BrowserContext for ChromeContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, RenderError> {
        let page = self
            .browser
            .new_page(self.ownership.target_params()?)
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        let interceptor = if self.blocked.is_empty() {
            None
        } else {
            Some(block_resources(&page, &self.blocked).await?)
        };

        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;
        let lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        Ok(Box::new(ChromePage {
            page: Some(page),
            lifecycle,
            interceptor,
        }))
    }

    async fn close(&mut self) {
        match &self.ownership {
            Ownership::Launched => {
                if let Err(e) = self.browser.close().await {
                    warn!(error = %e, "Failed to close browser");
                }
                let _ = self.browser.wait().await;
            }
            Ownership::Connected { context_id } => {
                if let Err(e) = self.browser.dispose_browser_context(context_id.clone()).await {
                    warn!(error = %e, "Failed to dispose browser context");
                }
            }
        }
        self.handler_task.abort();
    }
}

/// Fails every paused request of a blocked type before it reaches the network
async fn block_resources(
    page: &Page,
    blocked: &[ResourceType],
) -> Result<JoinHandle<()>, RenderError> {
    let patterns = blocked
        .iter()
        .map(|kind| RequestPattern::builder().resource_type(kind.clone()).build())
        .collect::<Vec<_>>();

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| RenderError::Page(e.to_string()))?;

    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| RenderError::Page(e.to_string()))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
            if page.execute(fail).await.is_err() {
                break;
            }
        }
    }))
}

struct ChromePage {
    page: Option<Page>,
    lifecycle: EventStream<EventLifecycleEvent>,
    interceptor: Option<JoinHandle<()>>,
}

impl ChromePage {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Page("page already closed".to_string()))
    }

    async fn snapshot(&self) -> Result<PageSnapshot, RenderError> {
        let page = self.page()?;
        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;
        let title = page.get_title().await.ok().flatten();
        let final_url = page.url().await.ok().flatten();

        Ok(PageSnapshot {
            html,
            title,
            final_url,
        })
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot, RenderError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| RenderError::from_navigation_message(e.to_string()))?;
        self.snapshot().await
    }

    async fn wait_for_idle(&mut self) -> Result<PageSnapshot, RenderError> {
        let main_frame = self.page()?.mainframe().await.ok().flatten();
        let mut navigated = false;

        while let Some(event) = self.lifecycle.next().await {
            if main_frame.as_ref().is_some_and(|frame| *frame != event.frame_id) {
                continue;
            }
            match event.name.as_str() {
                NAVIGATION_START => navigated = true,
                NETWORK_IDLE if navigated => return self.snapshot().await,
                _ => {}
            }
        }

        Err(RenderError::Timeout("network idle"))
    }

    async fn close(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "Failed to close page");
            }
        }
    }
}

/// Maps a configured resource type name onto the protocol enum
fn resource_type(name: &str) -> Option<ResourceType> {
    let kind = match name.to_lowercase().as_str() {
        "document" => ResourceType::Document,
        "stylesheet" => ResourceType::Stylesheet,
        "image" => ResourceType::Image,
        "media" => ResourceType::Media,
        "font" => ResourceType::Font,
        "script" => ResourceType::Script,
        "texttrack" => ResourceType::TextTrack,
        "xhr" => ResourceType::Xhr,
        "fetch" => ResourceType::Fetch,
        "eventsource" => ResourceType::EventSource,
        "websocket" => ResourceType::WebSocket,
        "manifest" => ResourceType::Manifest,
        "other" => ResourceType::Other,
        _ => return None,
    };
    Some(kind)
}
