//! Storage module for persisting crawl results
//!
//! This module handles the per-business document store, including:
//! - The `DocumentStore` trait and its error type
//! - An Elasticsearch backend using a server-side merge script
//! - A SQLite backend with the same merge semantics
//! - The retrying upsert pipeline used by the crawl controller

mod elastic;
mod pipeline;
mod schema;
mod sqlite;
mod traits;

pub use elastic::ElasticStore;
pub use pipeline::UpsertPipeline;
pub use sqlite::SqliteStore;
pub use traits::{DocumentStore, StoreError, StoreResult};

use crate::config::{StoreBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Opens the store selected by the configuration
///
/// # Arguments
///
/// * `config` - The store section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn DocumentStore>)` - A shareable store handle
/// * `Err(StoreError)` - The backend could not be opened
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Elasticsearch => Ok(Arc::new(ElasticStore::new(config)?)),
        StoreBackend::Sqlite => {
            let path = config
                .database_path
                .as_deref()
                .ok_or_else(|| StoreError::Config("database_path is required".to_string()))?;
            Ok(Arc::new(SqliteStore::new(Path::new(path))?))
        }
    }
}

/// One crawled page as stored in a business document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub img_urls: Vec<String>,
    pub pdf_urls: Vec<String>,
    pub content_hash: String,
    /// Milliseconds since the Unix epoch
    pub last_modified: i64,
}

/// The aggregate record of one business
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessDocument {
    pub business_id: String,

    /// Enrichment fields carried through from the provider record
    pub fields: serde_json::Map<String, serde_json::Value>,

    pub pages: Vec<PageRecord>,

    /// Last time a page was added or changed (milliseconds)
    pub refresh_pages_time: Option<i64>,
}

impl BusinessDocument {
    /// Looks up a stored page by URL
    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.iter().find(|page| page.url == url)
    }
}
