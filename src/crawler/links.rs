//! Link extraction from rendered HTML
//!
//! Turns the anchors of a page into the deduplicated set of same-site,
//! renderable absolute URLs that the crawl controller may enqueue.

use crate::url::{url_fingerprint, SiteScope};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// File extensions that are never handed to the browser
const DENIED_EXTENSIONS: &[&str] = &[
    "xls", "xlsx", "ppt", "pptx", "zip", "rar", "jpg", "jpeg", "png", "gif", "mp3", "mp4", "avi",
    "mov", "ics", "ical", "pdf", "doc", "docx",
];

/// `format=` query values that denote a file download
const DENIED_FORMATS: &[&str] = &["ical", "ics", "pdf"];

/// Extracts the in-scope links of a page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` resolved against the page URL
/// - Hosts accepted by the site scope
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links, fragment-only links
/// - Paths ending in a denied extension, `format=ical|ics|pdf` queries
///
/// # Arguments
///
/// * `html` - The rendered page
/// * `base_url` - The URL the page was loaded from
/// * `scope` - The site the crawl is confined to
///
/// # Returns
///
/// Absolute URLs, one per URL fingerprint, in fingerprint order
///
/// # Example
///
/// ```
/// use site_harvest::crawler::extract_links;
/// use site_harvest::SiteScope;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let scope = SiteScope::from_seed(&base).unwrap();
/// let html = r#"<a href="/about">About</a><a href="/about#team">Team</a><a href="/menu.zip">Menu</a>"#;
/// let links = extract_links(html, &base, &scope);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/about");
/// ```
pub fn extract_links(html: &str, base_url: &Url, scope: &SiteScope) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links: BTreeMap<String, Url> = BTreeMap::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if !scope.contains(&url) || is_denied(&url) {
            continue;
        }

        links.entry(url_fingerprint(&url)).or_insert(url);
    }

    links.into_values().collect()
}

/// Extracts the page title from an HTML document or fragment
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns true if the URL points at a file type the crawler never renders
pub fn is_denied(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let denied_extension = path
        .rsplit_once('.')
        .map(|(_, ext)| DENIED_EXTENSIONS.contains(&ext))
        .unwrap_or(false);

    denied_extension
        || url.query_pairs().any(|(key, value)| {
            key == "format" && DENIED_FORMATS.contains(&value.to_lowercase().as_str())
        })
}

/// Resolves a link href to an absolute HTTP(S) URL without fragment
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
