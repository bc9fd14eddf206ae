//! Lightweight content-type probe
//!
//! Decides whether a URL is worth a full browser render by looking at its
//! suffix and, failing that, at the `Content-Type` of a streaming GET.

use crate::config::ClassifierConfig;
use crate::crawler::links::page_title;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Content category of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlKind {
    Html,
    Pdf,
    Docx,
    Other,
    /// The probe failed; terminal for this URL
    Error,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    pub kind: UrlKind,

    /// Title read from the start of an HTML body, when one was found
    pub title: Option<String>,
}

impl UrlInfo {
    fn of(kind: UrlKind) -> Self {
        Self { kind, title: None }
    }
}

/// Builds the HTTP session used by one page worker for probes
pub fn build_http_client(config: &ClassifierConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_millis(config.probe_timeout_ms))
        .connect_timeout(Duration::from_millis(config.probe_timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a URL before committing to a render
///
/// # Request Flow
///
/// 1. `.pdf` / `.docx` path suffix → answered without a request
/// 2. Streaming GET, classified by `Content-Type`
/// 3. For HTML, the first `title-read-limit` bytes are scanned for a title
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 429 | Retry up to `rate-limit-retries` times, fixed delay |
/// | HTTP 429, retries exhausted | Error |
/// | Any other non-2xx status | Error, no retry |
/// | Any request failure | Error, no retry |
///
/// # Arguments
///
/// * `client` - The worker's HTTP session
/// * `url` - The URL to classify
/// * `config` - Probe settings
pub async fn classify_url(client: &Client, url: &Url, config: &ClassifierConfig) -> UrlInfo {
    let path = url.path().to_lowercase();
    if path.ends_with(".pdf") {
        return UrlInfo::of(UrlKind::Pdf);
    }
    if path.ends_with(".docx") {
        return UrlInfo::of(UrlKind::Docx);
    }

    let mut attempt = 0;
    loop {
        let mut response = match client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "Probe request failed");
                return UrlInfo::of(UrlKind::Error);
            }
        };

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            if attempt >= config.rate_limit_retries {
                debug!(url = %url, attempts = attempt + 1, "Rate limited, giving up");
                return UrlInfo::of(UrlKind::Error);
            }
            attempt += 1;
            trace!(url = %url, attempt, "Rate limited, retrying");
            tokio::time::sleep(Duration::from_millis(config.rate_limit_delay_ms)).await;
            continue;
        }

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Probe returned an error status");
            return UrlInfo::of(UrlKind::Error);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let kind = kind_from_content_type(&content_type);
        if kind != UrlKind::Html {
            return UrlInfo::of(kind);
        }

        let head = read_prefix(&mut response, config.title_read_limit).await;
        return UrlInfo {
            kind,
            title: page_title(&String::from_utf8_lossy(&head)),
        };
    }
}

/// Maps a `Content-Type` header value onto a URL kind
fn kind_from_content_type(content_type: &str) -> UrlKind {
    if content_type.contains("text/html") {
        UrlKind::Html
    } else if content_type.contains("application/pdf") {
        UrlKind::Pdf
    } else if content_type.contains(DOCX_MIME) {
        UrlKind::Docx
    } else {
        UrlKind::Other
    }
}

/// Reads at most `limit` body bytes, stopping early at `</title>`
async fn read_prefix(response: &mut reqwest::Response, limit: usize) -> Vec<u8> {
    let mut buffer = Vec::new();

    while buffer.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - buffer.len());
                buffer.extend_from_slice(&chunk[..take]);
                if contains_title_end(&buffer) {
                    break;
                }
            }
            _ => break,
        }
    }

    buffer
}

fn contains_title_end(buffer: &[u8]) -> bool {
    buffer
        .windows(8)
        .any(|window| window.eq_ignore_ascii_case(b"</title>"))
}
