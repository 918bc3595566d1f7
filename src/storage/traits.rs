//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::dedup::CandidateRecord;
use crate::state::ProcessingState;
use crate::storage::{CrawlConfigRecord, RunCounters, RunRecord, RunStatus, StoredDocument};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for Document Store implementations
///
/// Implementations are driven from one thread at a time; callers that share
/// a store wrap it in a `Mutex`. Every method is a single logical statement
/// so a crash between calls never leaves a half-applied change.
pub trait Storage {
    // ===== Crawl Config (watermark) =====

    /// Creates the crawl config row for a source if it does not exist yet
    ///
    /// Returns true if a row was created.
    fn seed_crawl_config(&mut self, source_id: &str, crawled_through: &str)
        -> StorageResult<bool>;

    /// Gets the crawl config row for a source
    fn get_crawl_config(&self, source_id: &str) -> StorageResult<Option<CrawlConfigRecord>>;

    /// Overwrites the watermark and last crawl timestamp of a source
    fn save_crawl_config(
        &mut self,
        source_id: &str,
        crawled_through: &str,
        crawled_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Lists every crawl config row, ordered by source id
    fn list_crawl_configs(&self) -> StorageResult<Vec<CrawlConfigRecord>>;

    // ===== Documents =====

    /// Point lookup by natural key digest
    fn find_document(
        &self,
        source_id: &str,
        natural_key: &str,
    ) -> StorageResult<Option<StoredDocument>>;

    /// Inserts a `New` document unless one with the same natural key exists
    ///
    /// # Returns
    ///
    /// * `Some(id)` - The document was inserted
    /// * `None` - The natural key was already taken
    fn insert_document(
        &mut self,
        source_id: &str,
        record: &CandidateRecord,
    ) -> StorageResult<Option<i64>>;

    /// Gets a document by ID
    fn get_document(&self, document_id: i64) -> StorageResult<StoredDocument>;

    /// Records the outcome of one fetch attempt in a single write
    ///
    /// Sets the state, the artifact path and the error message, and bumps the
    /// attempt counter.
    fn record_fetch_outcome(
        &mut self,
        document_id: i64,
        state: ProcessingState,
        artifact_path: Option<&str>,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Sets the processing state only (used by downstream processing)
    fn set_processing_state(&mut self, document_id: i64, state: ProcessingState)
        -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a new run row in `Running` state
    fn create_run(&mut self, source_id: &str, config_hash: &str) -> StorageResult<i64>;

    /// Closes a run with its final status and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a source
    fn get_latest_run(&self, source_id: &str) -> StorageResult<Option<RunRecord>>;

    // ===== Statistics =====

    /// Counts documents of a source in a given state
    fn count_documents_by_state(&self, source_id: &str, state: ProcessingState)
        -> StorageResult<u64>;

    /// Counts all documents of a source
    fn count_documents(&self, source_id: &str) -> StorageResult<u64>;
}
