//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::dedup::{CandidateRecord, Classification, NaturalKey};
use crate::state::ProcessingState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CrawlConfigRecord, RunCounters, RunRecord, RunStatus, StoredDocument};
use crate::IngestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DOCUMENT_COLUMNS: &str = "id, source_id, natural_key, key_json, state, download_url,
     filed_date, category, region, sub_category, year, payload, artifact_path,
     error_message, attempts, created_at, updated_at";

const RUN_COLUMNS: &str = "id, source_id, started_at, finished_at, config_hash, status,
     inserted, retried, skipped, downloaded, failed";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(IngestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, IngestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, IngestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn column_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

/// Maps undecodable column values to serialization errors
fn decode_error(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(index, _, source) => {
            StorageError::Serialization(format!("column {}: {}", index, source))
        }
        other => StorageError::Sqlite(other),
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    let key_json: String = row.get(3)?;
    let state: String = row.get(4)?;
    let payload: Option<String> = row.get(11)?;

    let key = NaturalKey::from_json(&key_json)
        .ok_or_else(|| column_error(3, format!("invalid natural key '{}'", key_json)))?;
    let state = ProcessingState::from_db_string(&state)
        .ok_or_else(|| column_error(4, format!("unknown processing state '{}'", state)))?;
    let payload = payload
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| column_error(11, e.to_string()))?;

    Ok(StoredDocument {
        id: row.get(0)?,
        source_id: row.get(1)?,
        natural_key: row.get(2)?,
        key,
        state,
        download_url: row.get(5)?,
        filed_date: row.get(6)?,
        classification: Classification {
            category: row.get(7)?,
            region: row.get(8)?,
            sub_category: row.get(9)?,
            year: row.get(10)?,
        },
        payload,
        artifact_path: row.get(12)?,
        error_message: row.get(13)?,
        attempts: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        counters: RunCounters {
            inserted: row.get::<_, i64>(6)? as u64,
            retried: row.get::<_, i64>(7)? as u64,
            skipped: row.get::<_, i64>(8)? as u64,
            downloaded: row.get::<_, i64>(9)? as u64,
            failed: row.get::<_, i64>(10)? as u64,
        },
    })
}

fn crawl_config_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlConfigRecord> {
    let last_crawl: Option<String> = row.get(2)?;
    Ok(CrawlConfigRecord {
        source_id: row.get(0)?,
        crawled_through: row.get(1)?,
        last_crawl_timestamp: last_crawl.and_then(|ts| ts.parse::<DateTime<Utc>>().ok()),
    })
}

impl Storage for SqliteStorage {
    // ===== Crawl Config (watermark) =====

    fn seed_crawl_config(
        &mut self,
        source_id: &str,
        crawled_through: &str,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO crawl_configs (source_id, crawled_through) VALUES (?1, ?2)",
            params![source_id, crawled_through],
        )?;
        Ok(inserted == 1)
    }

    fn get_crawl_config(&self, source_id: &str) -> StorageResult<Option<CrawlConfigRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT source_id, crawled_through, last_crawl_timestamp
                 FROM crawl_configs WHERE source_id = ?1",
                params![source_id],
                crawl_config_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn save_crawl_config(
        &mut self,
        source_id: &str,
        crawled_through: &str,
        crawled_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO crawl_configs (source_id, crawled_through, last_crawl_timestamp)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source_id) DO UPDATE SET
                crawled_through = excluded.crawled_through,
                last_crawl_timestamp = excluded.last_crawl_timestamp",
            params![source_id, crawled_through, crawled_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn list_crawl_configs(&self) -> StorageResult<Vec<CrawlConfigRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, crawled_through, last_crawl_timestamp
             FROM crawl_configs ORDER BY source_id",
        )?;

        let records = stmt
            .query_map([], crawl_config_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Documents =====

    fn find_document(
        &self,
        source_id: &str,
        natural_key: &str,
    ) -> StorageResult<Option<StoredDocument>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE source_id = ?1 AND natural_key = ?2",
            DOCUMENT_COLUMNS
        );
        let document = self
            .conn
            .query_row(&sql, params![source_id, natural_key], document_from_row)
            .optional()
            .map_err(decode_error)?;
        Ok(document)
    }

    fn insert_document(
        &mut self,
        source_id: &str,
        record: &CandidateRecord,
    ) -> StorageResult<Option<i64>> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        // The unique constraint is the real dedup guard; a conflict means another
        // admission got there first.
        let inserted = self.conn.execute(
            "INSERT INTO documents (source_id, natural_key, key_json, state, download_url,
             filed_date, category, region, sub_category, year, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
             ON CONFLICT(source_id, natural_key) DO NOTHING",
            params![
                source_id,
                record.key.digest(),
                record.key.to_json(),
                ProcessingState::New.to_db_string(),
                record.download_url,
                record.filed_date,
                record.classification.category,
                record.classification.region,
                record.classification.sub_category,
                record.classification.year,
                payload,
                now,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn get_document(&self, document_id: i64) -> StorageResult<StoredDocument> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        self.conn
            .query_row(&sql, params![document_id], document_from_row)
            .optional()
            .map_err(decode_error)?
            .ok_or(StorageError::DocumentNotFound(document_id))
    }

    fn record_fetch_outcome(
        &mut self,
        document_id: i64,
        state: ProcessingState,
        artifact_path: Option<&str>,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE documents SET state = ?1, artifact_path = ?2, error_message = ?3,
             attempts = attempts + 1, updated_at = ?4 WHERE id = ?5",
            params![
                state.to_db_string(),
                artifact_path,
                error_message,
                now,
                document_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::DocumentNotFound(document_id));
        }
        Ok(())
    }

    fn set_processing_state(
        &mut self,
        document_id: i64,
        state: ProcessingState,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE documents SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.to_db_string(), now, document_id],
        )?;

        if updated == 0 {
            return Err(StorageError::DocumentNotFound(document_id));
        }
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, source_id: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cycle_runs (source_id, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                source_id,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE cycle_runs SET status = ?1, finished_at = ?2, inserted = ?3, retried = ?4,
             skipped = ?5, downloaded = ?6, failed = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                counters.inserted as i64,
                counters.retried as i64,
                counters.skipped as i64,
                counters.downloaded as i64,
                counters.failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM cycle_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, source_id: &str) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM cycle_runs WHERE source_id = ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(&sql, params![source_id], run_from_row)
            .optional()?;
        Ok(run)
    }

    // ===== Statistics =====

    fn count_documents_by_state(
        &self,
        source_id: &str,
        state: ProcessingState,
    ) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE source_id = ?1 AND state = ?2",
            params![source_id, state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_documents(&self, source_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
