//! Optional robots.txt check
//!
//! When enabled, a site controller fetches `/robots.txt` for the seed
//! origin once and consults it before every fetch.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use tracing::debug;
use url::Url;

/// Product token matched against `User-agent` groups
pub const ROBOTS_AGENT: &str = "site-harvest";

/// Fetches robots.txt for the origin of `site_url`
///
/// Any failure (network error, non-2xx status, unreadable body) yields
/// allow-all rules.
///
/// # Arguments
///
/// * `client` - The HTTP session of the calling worker
/// * `site_url` - Any URL on the site, usually the seed
pub async fn fetch_robots(client: &Client, site_url: &Url) -> ParsedRobots {
    let robots_url = match site_url.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt unavailable, allowing all");
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!(url = %robots_url, status = %response.status(), "No robots.txt, allowing all");
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            debug!(url = %robots_url, error = %e, "Unreadable robots.txt, allowing all");
            ParsedRobots::allow_all()
        }
    }
}
