//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Docket database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One watermark row per source
CREATE TABLE IF NOT EXISTS crawl_configs (
    source_id TEXT PRIMARY KEY,
    crawled_through TEXT NOT NULL,
    last_crawl_timestamp TEXT
);

-- Deduplicated documents; the natural key is unique per source
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    key_json TEXT NOT NULL,
    state TEXT NOT NULL,
    download_url TEXT NOT NULL,
    filed_date TEXT NOT NULL,
    category TEXT NOT NULL,
    region TEXT NOT NULL,
    sub_category TEXT,
    year INTEGER,
    payload TEXT,
    artifact_path TEXT,
    error_message TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(source_id, natural_key)
);

CREATE INDEX IF NOT EXISTS idx_documents_state ON documents(source_id, state);

-- One row per crawl cycle
CREATE TABLE IF NOT EXISTS cycle_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    inserted INTEGER NOT NULL DEFAULT 0,
    retried INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    downloaded INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cycle_runs_source ON cycle_runs(source_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
