//! Content pipeline
//!
//! Strips page chrome, collects image and PDF references, converts the
//! remaining markup to Markdown text, and fingerprints the result so the
//! store can tell new, changed and unchanged pages apart.

use crate::storage::PageRecord;
use crate::url::absolute_reference;
use chrono::Utc;
use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::trace;
use url::Url;

/// Elements removed together with their subtree
const STRIPPED_TAGS: &[&str] = &[
    "nav", "header", "footer", "br", "script", "style", "noscript", "iframe", "svg", "head",
];

/// Elements skipped by the Markdown converter in every mode
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head", "img"];

/// Elements without a closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Outcome of comparing a page against its stored version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// No record exists for the URL
    New,
    /// A record exists with a different fingerprint
    Changed,
    /// The stored fingerprint matches
    Unchanged,
}

impl ChangeKind {
    /// Returns true if the store has to write the page
    pub fn needs_write(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Decides whether a page is new, changed or unchanged
pub fn decide_change(stored_fingerprint: Option<&str>, fingerprint: &str) -> ChangeKind {
    match stored_fingerprint {
        None => ChangeKind::New,
        Some(stored) if stored == fingerprint => ChangeKind::Unchanged,
        Some(_) => ChangeKind::Changed,
    }
}

/// Markup with boilerplate removed, plus the references found in it
#[derive(Debug, Default)]
struct Stripped {
    html: String,
    images: BTreeSet<String>,
    pdfs: BTreeSet<String>,
}

/// Turns a rendered page into a record ready for the store
///
/// The landing page (depth 0) keeps its navigation in the text since it
/// usually lists what the business offers; deeper pages use the stripped
/// markup. References always come from the stripped markup.
///
/// # Arguments
///
/// * `url` - The URL the page was rendered from
/// * `html` - The rendered markup
/// * `title` - The page title, if known
/// * `depth` - Link depth of the page
pub fn process_page(url: &Url, html: &str, title: Option<String>, depth: u32) -> PageRecord {
    let domain = url.host_str().unwrap_or_default();
    let document = Html::parse_document(html);
    let stripped = strip_document(&document, domain);

    let content = if depth == 0 {
        to_text(html)
    } else {
        to_text(&stripped.html)
    };

    let img_urls: Vec<String> = stripped.images.into_iter().collect();
    let pdf_urls: Vec<String> = stripped.pdfs.into_iter().collect();
    let content_hash = content_fingerprint(&content, &img_urls, &pdf_urls);

    trace!(
        url = %url,
        content_len = content.len(),
        images = img_urls.len(),
        pdfs = pdf_urls.len(),
        "Page processed"
    );

    PageRecord {
        url: url.to_string(),
        title: title.unwrap_or_default(),
        content,
        img_urls,
        pdf_urls,
        content_hash,
        last_modified: Utc::now().timestamp_millis(),
    }
}

/// Hashes normalized text and the sorted reference lists
pub fn content_fingerprint(content: &str, img_urls: &[String], pdf_urls: &[String]) -> String {
    let mut images: Vec<&String> = img_urls.iter().collect();
    images.sort();
    images.dedup();
    let mut pdfs: Vec<&String> = pdf_urls.iter().collect();
    pdfs.sort();
    pdfs.dedup();

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    for image in images {
        hasher.update(image.as_bytes());
    }
    for pdf in pdfs {
        hasher.update(pdf.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Serializes the document without comments and stripped elements
fn strip_document(document: &Html, domain: &str) -> Stripped {
    let mut stripped = Stripped::default();
    strip_children(document.root_element(), domain, &mut stripped);
    stripped
}

fn strip_children(element: ElementRef<'_>, domain: &str, out: &mut Stripped) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.html.push_str(&html_escape::encode_text(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    strip_element(child, domain, out);
                }
            }
            _ => {}
        }
    }
}

fn strip_element(element: ElementRef<'_>, domain: &str, out: &mut Stripped) {
    let value = element.value();
    let name = value.name();
    if STRIPPED_TAGS.contains(&name) {
        return;
    }

    match name {
        "img" => {
            if let Some(src) = value.attr("src") {
                if !src.contains("base64") {
                    if let Some(src) = absolute_reference(src, domain) {
                        out.images.insert(src);
                    }
                }
            }
            // Images live in `img_urls` only.
            return;
        }
        "a" => {
            if let Some(href) = value.attr("href") {
                if href.to_lowercase().contains(".pdf") {
                    if let Some(href) = absolute_reference(href, domain) {
                        out.pdfs.insert(href);
                    }
                }
            }
        }
        _ => {}
    }

    let mut attrs: Vec<(&str, &str)> = value.attrs().collect();
    attrs.sort();

    out.html.push('<');
    out.html.push_str(name);
    for (key, val) in attrs {
        out.html.push(' ');
        out.html.push_str(key);
        out.html.push_str("=\"");
        out.html
            .push_str(&html_escape::encode_double_quoted_attribute(val));
        out.html.push('"');
    }
    out.html.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }

    strip_children(element, domain, out);

    out.html.push_str("</");
    out.html.push_str(name);
    out.html.push('>');
}

/// Converts markup to tidy Markdown text
fn to_text(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let markdown = match converter.convert(html) {
        Ok(markdown) => markdown,
        Err(_) => Html::parse_document(html)
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" "),
    };

    tidy_whitespace(&markdown)
}

/// Trims every line and collapses runs of blank lines into one
fn tidy_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    for line in text.lines().map(str::trim) {
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}
