//! Storage module for persisting ingestion state
//!
//! This module is the Document Store behind every crawl cycle:
//! - SQLite database initialization and schema management
//! - Per-source crawl config rows (the watermark)
//! - Deduplicated stored documents and their processing state
//! - Cycle run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::dedup::{Classification, NaturalKey};
use crate::state::ProcessingState;
use crate::IngestError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, IngestError> {
    SqliteStorage::new(path)
}

/// Locks a shared store, turning lock poisoning into a storage error
pub fn lock_storage<S: ?Sized>(storage: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// The per-source watermark row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfigRecord {
    pub source_id: String,
    /// Watermark in the source's own date format
    pub crawled_through: String,
    pub last_crawl_timestamp: Option<DateTime<Utc>>,
}

/// A durable, deduplicated document
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: i64,
    pub source_id: String,
    /// Digest of the natural key; unique per source
    pub natural_key: String,
    pub key: NaturalKey,
    pub state: ProcessingState,
    pub download_url: String,
    pub filed_date: String,
    pub classification: Classification,
    pub payload: Option<Value>,
    pub artifact_path: Option<String>,
    pub error_message: Option<String>,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Represents a crawl cycle run for one source
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counters: RunCounters,
}

/// Per-run record counters persisted with the run row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub inserted: u64,
    pub retried: u64,
    pub skipped: u64,
    pub downloaded: u64,
    pub failed: u64,
}

/// Status of a crawl cycle run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
