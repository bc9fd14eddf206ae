//! Provider records: the businesses to crawl
//!
//! Providers are read from a JSON array or a JSON-lines file. Only
//! `businessID` and `website` are interpreted; every other field is kept
//! verbatim and copied into the business document.

use crate::url::{parse_http_url, site_domain};
use crate::{HarvestError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;
use url::Url;

/// A business whose website is crawled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(rename = "businessID", deserialize_with = "string_or_number")]
    pub business_id: String,

    /// Empty when the record has no website
    #[serde(default, deserialize_with = "null_as_empty")]
    pub website: String,

    /// Enrichment fields (name, locality, review data, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Provider {
    /// Creates a provider without enrichment fields
    pub fn new(business_id: impl Into<String>, website: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            website: website.into(),
            fields: Map::new(),
        }
    }

    /// Parses the website as the crawl seed
    ///
    /// Bare hosts such as `acme.com/menu` are read as `http://` URLs.
    pub fn seed_url(&self) -> Result<Url> {
        let website = self.website.trim();
        let url = match Url::parse(website) {
            Err(::url::ParseError::RelativeUrlWithoutBase) => {
                parse_http_url(&format!("http://{}", website))?
            }
            _ => parse_http_url(website)?,
        };
        Ok(url)
    }

    /// All top-level fields of the business document except `pages`
    pub fn document_fields(&self) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        fields.insert(
            "businessID".to_string(),
            Value::String(self.business_id.clone()),
        );
        fields.insert("website".to_string(), Value::String(self.website.clone()));
        fields
    }

    /// Fills `domain` from the website host when the record has none
    fn with_derived_domain(mut self) -> Self {
        let missing = match self.fields.get("domain") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };

        if missing {
            if let Some(domain) = self.seed_url().ok().as_ref().and_then(site_domain) {
                self.fields.insert("domain".to_string(), Value::String(domain));
            }
        }
        self
    }
}

/// One unit of dispatch work
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub provider: Provider,
}

impl From<Provider> for CrawlJob {
    fn from(provider: Provider) -> Self {
        Self { provider }
    }
}

/// Loads providers from a JSON array or JSON-lines file
///
/// Records whose website is not a usable HTTP(S) URL are skipped with a
/// warning; a malformed file is an error.
///
/// # Arguments
///
/// * `path` - Path to the provider file
pub fn load_providers(path: &Path) -> Result<Vec<Provider>> {
    let content = std::fs::read_to_string(path)?;
    parse_providers(&content)
}

/// Parses provider records from JSON or JSON-lines text
pub fn parse_providers(content: &str) -> Result<Vec<Provider>> {
    let trimmed = content.trim_start();
    let raw: Vec<Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?
    };

    let mut providers = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        let provider: Provider = serde_json::from_value(value)
            .map_err(|e| HarvestError::Provider(format!("record {}: {}", index, e)))?;

        if let Err(e) = provider.seed_url() {
            warn!(
                business_id = %provider.business_id,
                website = %provider.website,
                error = %e,
                "Skipping provider without a usable website"
            );
            continue;
        }

        providers.push(provider.with_derived_domain());
    }

    Ok(providers)
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "businessID must be a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_json_array() {
        let providers = parse_providers(
            r#"[
                {"businessID": 42, "website": "https://www.acme.com", "state": "TX", "googleReviewRating": 4.5},
                {"businessID": "b-7", "website": "http://plumb.example.org/", "domain": "plumb.example.org"}
            ]"#,
        )
        .unwrap();

        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].business_id, "42");
        assert_eq!(providers[0].fields["state"], "TX");
        assert_eq!(providers[0].fields["domain"], "acme.com");
        assert_eq!(providers[1].business_id, "b-7");
        assert_eq!(providers[1].fields["domain"], "plumb.example.org");
    }

    #[test]
    fn test_parse_json_lines() {
        let providers = parse_providers(
            "{\"businessID\": 1, \"website\": \"https://a.com\"}\n\n{\"businessID\": 2, \"website\": \"https://b.com\"}\n",
        )
        .unwrap();

        assert_eq!(providers.len(), 2);
        assert_eq!(providers[1].business_id, "2");
    }

    #[test]
    fn test_unusable_website_skipped() {
        let providers = parse_providers(
            r#"[{"businessID": 1, "website": "not a url"}, {"businessID": 2, "website": "mailto:x@y.com"}, {"businessID": 3, "website": "https://ok.com"}]"#,
        )
        .unwrap();

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].business_id, "3");
    }

    #[test]
    fn test_missing_website_skipped() {
        let providers = parse_providers(
            r#"[{"businessID": 1, "website": null}, {"businessID": 2}, {"businessID": 3, "website": ""}, {"businessID": 4, "website": "https://ok.com"}]"#,
        )
        .unwrap();

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].business_id, "4");
    }

    #[test]
    fn test_bare_host_gets_http_scheme() {
        let providers =
            parse_providers(r#"[{"businessID": 1, "website": "www.acme.com/menu"}]"#).unwrap();

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].website, "www.acme.com/menu");
        assert_eq!(
            providers[0].seed_url().unwrap().as_str(),
            "http://www.acme.com/menu"
        );
        assert_eq!(providers[0].fields["domain"], "acme.com");
    }

    #[test]
    fn test_invalid_business_id_rejected() {
        let result = parse_providers(r#"[{"businessID": [1], "website": "https://ok.com"}]"#);
        assert!(matches!(result, Err(HarvestError::Provider(_))));
    }

    #[test]
    fn test_document_fields_carry_enrichment() {
        let mut provider = Provider::new("9", "https://acme.com");
        provider
            .fields
            .insert("businessFullName".to_string(), Value::from("Acme LLC"));

        let fields = provider.document_fields();
        assert_eq!(fields["businessID"], "9");
        assert_eq!(fields["website"], "https://acme.com");
        assert_eq!(fields["businessFullName"], "Acme LLC");
    }

    #[test]
    fn test_load_providers_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[{"businessID": 5, "website": "https://five.com"}]"#)
            .unwrap();
        file.flush().unwrap();

        let providers = load_providers(file.path()).unwrap();
        assert_eq!(providers[0].website, "https://five.com");
    }
}
