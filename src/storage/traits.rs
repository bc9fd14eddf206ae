//! Storage traits and error types
//!
//! This module defines the trait interface for document store backends and
//! associated error types.

use crate::crawler::ChangeKind;
use crate::provider::Provider;
use crate::storage::{BusinessDocument, PageRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store configuration: {0}")]
    Config(String),

    #[error("Unexpected store response: {0}")]
    UnexpectedResponse(String),

    #[error("Store connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Returns true if repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                *status == 409 || *status == 429 || (500..600).contains(status)
            }
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A store holding one document per business
///
/// Implementations must make `upsert_page` idempotent: repeating a call
/// with an unchanged page neither duplicates the page nor bumps its
/// `last_modified`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merges one page into the business document, creating it if missing
    ///
    /// # Returns
    ///
    /// Whether the page was new, changed, or left untouched
    async fn upsert_page(&self, provider: &Provider, page: &PageRecord) -> StoreResult<ChangeKind>;

    /// Creates the business document with no pages if it does not exist
    async fn ensure_document(&self, provider: &Provider) -> StoreResult<()>;

    /// Reads a business document
    async fn get_document(&self, business_id: &str) -> StoreResult<Option<BusinessDocument>>;
}
