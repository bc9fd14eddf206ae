use url::Url;

/// Extracts the lowercase host of a URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the host of a URL lowercased and without a leading `www.`
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_harvest::url::site_domain;
///
/// let url = Url::parse("https://WWW.Example.com/about").unwrap();
/// assert_eq!(site_domain(&url), Some("example.com".to_string()));
/// ```
pub fn site_domain(url: &Url) -> Option<String> {
    extract_domain(url).map(|host| strip_www(&host).to_string())
}

/// Removes a single leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Turns a resource reference found on a page into an absolute URL string
///
/// Protocol-relative references get `http:`; site-relative ones are joined
/// onto `http://{domain}`. Absolute references are returned unchanged.
///
/// # Arguments
///
/// * `reference` - The raw `src`/`href` value
/// * `domain` - The host of the page the reference was found on
///
/// # Returns
///
/// * `Some(String)` - The absolute reference
/// * `None` - The reference cannot be resolved
pub fn absolute_reference(reference: &str, domain: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if reference.starts_with("//") {
        return Some(format!("http:{}", reference));
    }

    if let Ok(url) = Url::parse(reference) {
        return Some(url.to_string());
    }

    let base = Url::parse(&format!("http://{}/", domain)).ok()?;
    base.join(reference).ok().map(|url| url.to_string())
}
