//! SQLite document store
//!
//! A local stand-in for the shared document store with the same merge
//! semantics: one business row, pages keyed by URL, writes only for new or
//! changed fingerprints.

use crate::crawler::{decide_change, ChangeKind};
use crate::provider::Provider;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, StoreError, StoreResult};
use crate::storage::{BusinessDocument, PageRecord};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Inserts the business row if it does not exist yet
fn insert_business(conn: &Connection, provider: &Provider) -> StoreResult<()> {
    let fields = serde_json::to_string(&provider.document_fields())?;
    conn.execute(
        "INSERT OR IGNORE INTO businesses (business_id, website, fields, refresh_pages_time, created_at)
         VALUES (?1, ?2, ?3, NULL, ?4)",
        params![
            provider.business_id,
            provider.website,
            fields,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_page(&self, provider: &Provider, page: &PageRecord) -> StoreResult<ChangeKind> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        insert_business(&tx, provider)?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT content_hash FROM pages WHERE business_id = ?1 AND url = ?2",
                params![provider.business_id, page.url],
                |row| row.get(0),
            )
            .optional()?;

        let change = decide_change(stored.as_deref(), &page.content_hash);
        if change.needs_write() {
            tx.execute(
                "INSERT INTO pages (business_id, url, title, content, img_urls, pdf_urls, content_hash, last_modified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(business_id, url) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    img_urls = excluded.img_urls,
                    pdf_urls = excluded.pdf_urls,
                    content_hash = excluded.content_hash,
                    last_modified = excluded.last_modified",
                params![
                    provider.business_id,
                    page.url,
                    page.title,
                    page.content,
                    serde_json::to_string(&page.img_urls)?,
                    serde_json::to_string(&page.pdf_urls)?,
                    page.content_hash,
                    page.last_modified,
                ],
            )?;
            tx.execute(
                "UPDATE businesses SET refresh_pages_time = ?1 WHERE business_id = ?2",
                params![page.last_modified, provider.business_id],
            )?;
        }

        tx.commit()?;
        Ok(change)
    }

    async fn ensure_document(&self, provider: &Provider) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_business(&conn, provider)
    }

    async fn get_document(&self, business_id: &str) -> StoreResult<Option<BusinessDocument>> {
        let conn = self.lock()?;

        let business: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT fields, refresh_pages_time FROM businesses WHERE business_id = ?1",
                params![business_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((fields, refresh_pages_time)) = business else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT url, title, content, img_urls, pdf_urls, content_hash, last_modified
             FROM pages WHERE business_id = ?1 ORDER BY url",
        )?;
        let rows = stmt.query_map(params![business_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut pages = Vec::new();
        for row in rows {
            let (url, title, content, img_urls, pdf_urls, content_hash, last_modified) = row?;
            pages.push(PageRecord {
                url,
                title,
                content,
                img_urls: serde_json::from_str(&img_urls)?,
                pdf_urls: serde_json::from_str(&pdf_urls)?,
                content_hash,
                last_modified,
            });
        }

        Ok(Some(BusinessDocument {
            business_id: business_id.to_string(),
            fields: serde_json::from_str(&fields)?,
            pages,
            refresh_pages_time,
        }))
    }
}
