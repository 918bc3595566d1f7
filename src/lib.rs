//! Sumi-Docket: incremental court-opinion ingestion
//!
//! This crate drives recurring crawl cycles over many unreliable record sources.
//! Each cycle resumes a source from its persisted watermark, admits every record
//! through a deduplication gate, downloads the record's artifact through a
//! rotating proxy pool and finally advances the watermark.

pub mod adapter;
pub mod config;
pub mod cycle;
pub mod dedup;
pub mod deferred;
pub mod fetcher;
pub mod output;
pub mod proxy;
pub mod state;
pub mod storage;
pub mod watermark;

use thiserror::Error;

/// Main error type for Sumi-Docket operations
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Source adapter error: {0}")]
    Adapter(#[from] adapter::AdapterError),

    #[error("Watermark error: {0}")]
    Watermark(#[from] watermark::WatermarkError),

    #[error("Range split error: {0}")]
    Split(#[from] watermark::SplitError),

    #[error("Deferred sequence error: {0}")]
    Deferred(#[from] deferred::DeferredError),

    #[error("Invalid cycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CycleState,
        to: state::CycleState,
    },

    #[error("No crawl config row for source '{0}'")]
    UnknownSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Sumi-Docket operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use cycle::{CancelFlag, CrawlCycle, CycleReport};
pub use dedup::{CandidateRecord, DedupGate, DedupOutcome, NaturalKey};
pub use deferred::DeferredSequence;
pub use state::{CycleState, ProcessingState};
pub use watermark::DateRange;
