//! Database schema definitions
//!
//! This module contains the SQL schema of the local business document store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per business document
CREATE TABLE IF NOT EXISTS businesses (
    business_id TEXT PRIMARY KEY,
    website TEXT NOT NULL,
    fields TEXT NOT NULL,
    refresh_pages_time INTEGER,
    created_at TEXT NOT NULL
);

-- Pages of a business document, keyed by URL
CREATE TABLE IF NOT EXISTS pages (
    business_id TEXT NOT NULL REFERENCES businesses(business_id),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    img_urls TEXT NOT NULL,
    pdf_urls TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    last_modified INTEGER NOT NULL,
    PRIMARY KEY (business_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_business ON pages(business_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
