use crate::UrlError;
use sha2::{Digest, Sha256};
use url::Url;

/// List of tracking query parameters dropped from the canonical form
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Parses a string as an absolute HTTP(S) URL with a host
///
/// # Arguments
///
/// * `url_str` - The URL string to parse
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The string is malformed, not HTTP(S), or has no host
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDomain),
    }
}

/// Builds the canonical identity string of a URL
///
/// Two URLs with the same canonical form are the same page for
/// deduplication purposes.
///
/// # Canonicalization Steps
///
/// 1. Drop the scheme (`http` and `https` collapse)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Keep an explicit non-default port
/// 4. Normalize the path: dot segments, repeated and trailing slashes
/// 5. Drop the fragment
/// 6. Drop tracking query parameters and sort the rest
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_harvest::url::canonical_form;
///
/// let url = Url::parse("HTTP://WWW.Example.com/a/./b/?utm_source=x&z=1&a=2#top").unwrap();
/// assert_eq!(canonical_form(&url), "example.com/a/b?a=2&z=1");
/// ```
pub fn canonical_form(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut canonical = String::from(host);
    if let Some(port) = url.port() {
        canonical.push(':');
        canonical.push_str(&port.to_string());
    }

    canonical.push_str(&normalize_path(url.path()));

    let params = filter_and_sort_query_params(url);
    if !params.is_empty() {
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        canonical.push('?');
        canonical.push_str(&query_string);
    }

    canonical
}

/// Computes the SHA-256 fingerprint of a URL's canonical form
///
/// This is the key stored in a site's visited set.
pub fn url_fingerprint(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(url).as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Skip empty segments (from multiple slashes) and current directory markers
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
