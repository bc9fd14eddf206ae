//! Elasticsearch document store
//!
//! Every page write is a single `_update` call keyed by business id. A
//! painless script merges the page into `pages[]` by URL and turns the call
//! into a `noop` when the stored fingerprint already matches, so repeating a
//! write never duplicates a page or bumps its timestamp.

use crate::config::StoreConfig;
use crate::crawler::ChangeKind;
use crate::provider::Provider;
use crate::storage::traits::{DocumentStore, StoreError, StoreResult};
use crate::storage::{BusinessDocument, PageRecord};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Merges `params.page` into `ctx._source.pages` keyed by URL
const MERGE_PAGE_SCRIPT: &str = r#"
if (ctx._source.pages == null) { ctx._source.pages = new ArrayList(); }
def found = null;
for (def p : ctx._source.pages) {
  if (p.url == params.page.url) { found = p; break; }
}
if (found == null) {
  ctx._source.pages.add(params.page);
  ctx._source.refresh_pages_time = params.now;
  ctx._source.last_page_change = 'new';
} else if (found.content_hash != params.page.content_hash) {
  found.putAll(params.page);
  ctx._source.refresh_pages_time = params.now;
  ctx._source.last_page_change = 'changed';
} else {
  ctx.op = 'none';
}
"#;

/// Leaves existing documents untouched
const NOOP_SCRIPT: &str = "ctx.op = 'none'";

/// Top-level document fields that are not enrichment data
const RESERVED_FIELDS: &[&str] = &["pages", "refresh_pages_time", "last_page_change"];

/// Elasticsearch-compatible store client
pub struct ElasticStore {
    client: Client,
    endpoint: Url,
    index: String,
    api_key: Option<String>,
}

impl ElasticStore {
    /// Creates a client from the store configuration
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| StoreError::Config("endpoint is required".to_string()))?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Config(format!("invalid endpoint: {}", e)))?;
        let index = config
            .index
            .clone()
            .ok_or_else(|| StoreError::Config("index is required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            index,
            api_key: config.api_key.clone(),
        })
    }

    /// Builds `{endpoint}/{index}/{action}/{id}` with each segment escaped
    fn document_url(&self, action: &str, id: &str) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Config("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(&self.index)
            .push(action)
            .push(id);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key)),
            None => request,
        }
    }

    async fn update(&self, id: &str, body: Value, return_source: bool) -> StoreResult<Value> {
        let mut url = self.document_url("_update", id)?;
        url.query_pairs_mut().append_pair("retry_on_conflict", "3");
        if return_source {
            url.query_pairs_mut()
                .append_pair("_source_includes", "last_page_change");
        }

        let response = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn upsert_page(&self, provider: &Provider, page: &PageRecord) -> StoreResult<ChangeKind> {
        let page_json = serde_json::to_value(page)?;

        let mut upsert = provider.document_fields();
        upsert.insert("pages".to_string(), Value::Array(vec![page_json.clone()]));
        upsert.insert("refresh_pages_time".to_string(), json!(page.last_modified));

        let body = json!({
            "script": {
                "source": MERGE_PAGE_SCRIPT,
                "lang": "painless",
                "params": {
                    "page": page_json,
                    "now": page.last_modified,
                }
            },
            "upsert": upsert,
        });

        let response = self.update(&provider.business_id, body, true).await?;
        let result = response.get("result").and_then(Value::as_str).unwrap_or("");
        trace!(business_id = %provider.business_id, url = %page.url, result, "Page upserted");

        match result {
            "created" => Ok(ChangeKind::New),
            "noop" => Ok(ChangeKind::Unchanged),
            "updated" => {
                let marker = response
                    .pointer("/get/_source/last_page_change")
                    .and_then(Value::as_str);
                Ok(match marker {
                    Some("new") => ChangeKind::New,
                    _ => ChangeKind::Changed,
                })
            }
            other => Err(StoreError::UnexpectedResponse(format!(
                "update result '{}'",
                other
            ))),
        }
    }

    async fn ensure_document(&self, provider: &Provider) -> StoreResult<()> {
        let mut upsert = provider.document_fields();
        upsert.insert("pages".to_string(), Value::Array(vec![]));

        let body = json!({
            "script": { "source": NOOP_SCRIPT, "lang": "painless" },
            "upsert": upsert,
        });

        self.update(&provider.business_id, body, false).await?;
        Ok(())
    }

    async fn get_document(&self, business_id: &str) -> StoreResult<Option<BusinessDocument>> {
        let url = self.document_url("_doc", business_id)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let source = match body.get("_source") {
            Some(Value::Object(source)) => source.clone(),
            _ => {
                return Err(StoreError::UnexpectedResponse(
                    "document has no _source".to_string(),
                ))
            }
        };

        Ok(Some(document_from_source(business_id, source)?))
    }
}

fn document_from_source(
    business_id: &str,
    mut source: Map<String, Value>,
) -> StoreResult<BusinessDocument> {
    let pages = match source.remove("pages") {
        Some(pages) => serde_json::from_value(pages)?,
        None => Vec::new(),
    };
    let refresh_pages_time = source.get("refresh_pages_time").and_then(Value::as_i64);
    for key in RESERVED_FIELDS {
        source.remove(*key);
    }

    Ok(BusinessDocument {
        business_id: business_id.to_string(),
        fields: source,
        pages,
        refresh_pages_time,
    })
}
