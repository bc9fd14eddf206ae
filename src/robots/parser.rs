//! Robots.txt rules for one site

use robotstxt::DefaultMatcher;
use url::Url;

/// Robots.txt content of a site origin
///
/// An empty body, or one that could not be fetched, allows everything.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: String,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow every URL
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks a full URL against the rules for `user_agent`
    ///
    /// # Arguments
    ///
    /// * `url` - The URL about to be fetched
    /// * `user_agent` - The product token the crawler identifies as
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url.as_str())
    }
}
