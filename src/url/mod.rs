//! URL handling module for Site-Harvest
//!
//! This module provides URL canonicalization and fingerprinting, domain
//! helpers, and the same-site scope rule used by the link extractor.

mod domain;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use domain::{absolute_reference, extract_domain, site_domain, strip_www};
pub use normalize::{canonical_form, parse_http_url, url_fingerprint};

/// Host whose form pages are always considered part of a business site
const FORMS_HOST: &str = "docs.google.com";

/// Path prefix of form pages on [`FORMS_HOST`]
const FORMS_PATH: &str = "/forms";

/// The set of hosts that belong to one business website
///
/// A host is in scope when it contains, or is contained in, the seed host
/// (both compared lowercase and without `www.`). This admits subdomains
/// (`blog.example.com`) and parent domains (`example.com` from a
/// `shop.example.com` seed). Registration forms hosted on Google Forms are
/// always in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    site: String,
}

impl SiteScope {
    /// Creates a scope from the seed URL of a site
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use site_harvest::SiteScope;
    ///
    /// let scope = SiteScope::from_seed(&Url::parse("https://www.example.com/").unwrap()).unwrap();
    /// assert!(scope.contains(&Url::parse("https://blog.example.com/x").unwrap()));
    /// assert!(!scope.contains(&Url::parse("https://other.com/x").unwrap()));
    /// ```
    pub fn from_seed(seed: &Url) -> UrlResult<Self> {
        let domain = site_domain(seed).ok_or(UrlError::MissingDomain)?;
        if domain.is_empty() {
            return Err(UrlError::MissingDomain);
        }
        Ok(Self { site: domain })
    }

    /// The normalized seed host
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Returns true if the URL belongs to this site
    pub fn contains(&self, url: &Url) -> bool {
        if is_forms_link(url) {
            return true;
        }

        match site_domain(url) {
            Some(host) if !host.is_empty() => {
                host.contains(self.site.as_str()) || self.site.contains(host.as_str())
            }
            _ => false,
        }
    }
}

/// Returns true for links into the hosted forms service
fn is_forms_link(url: &Url) -> bool {
    extract_domain(url).as_deref() == Some(FORMS_HOST) && url.path().starts_with(FORMS_PATH)
}
