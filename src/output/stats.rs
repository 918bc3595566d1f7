//! Statistics generation from the ingestion database
//!
//! This module provides functionality for extracting and displaying
//! per-source ingestion statistics from the storage layer.

use crate::state::ProcessingState;
use crate::storage::{RunRecord, Storage};
use crate::IngestError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Statistics of a single source
#[derive(Debug, Clone)]
pub struct SourceStatistics {
    pub source_id: String,

    /// Persisted watermark, in the source's own format
    pub crawled_through: String,

    /// When the watermark was last persisted
    pub last_crawl_timestamp: Option<DateTime<Utc>>,

    /// Total number of stored documents
    pub total_documents: u64,

    /// Count of documents by processing state
    pub documents_by_state: HashMap<ProcessingState, u64>,

    /// Most recent cycle run, if any
    pub latest_run: Option<RunRecord>,
}

impl SourceStatistics {
    fn count(&self, state: ProcessingState) -> u64 {
        self.documents_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Loads statistics for every source with a crawl config row
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Vec<SourceStatistics>)` - One entry per source, ordered by id
/// * `Err(IngestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Vec<SourceStatistics>, IngestError> {
    let mut all = Vec::new();

    for row in storage.list_crawl_configs()? {
        let mut documents_by_state = HashMap::new();
        for state in ProcessingState::all_states() {
            let count = storage.count_documents_by_state(&row.source_id, state)?;
            if count > 0 {
                documents_by_state.insert(state, count);
            }
        }

        all.push(SourceStatistics {
            total_documents: storage.count_documents(&row.source_id)?,
            latest_run: storage.get_latest_run(&row.source_id)?,
            source_id: row.source_id,
            crawled_through: row.crawled_through,
            last_crawl_timestamp: row.last_crawl_timestamp,
            documents_by_state,
        });
    }

    Ok(all)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &[SourceStatistics]) {
    println!("=== Ingestion Statistics ===\n");

    if stats.is_empty() {
        println!("No sources have been crawled yet.");
        return;
    }

    for source in stats {
        println!("Source: {}", source.source_id);
        println!("  Crawled through: {}", source.crawled_through);
        match source.last_crawl_timestamp {
            Some(ts) => println!("  Last advanced: {}", ts.to_rfc3339()),
            None => println!("  Last advanced: never"),
        }
        println!("  Documents: {}", source.total_documents);

        for state in ProcessingState::all_states() {
            let count = source.count(state);
            if count == 0 {
                continue;
            }
            let percentage = if source.total_documents > 0 {
                (count as f64 / source.total_documents as f64) * 100.0
            } else {
                0.0
            };
            println!("    {}: {} ({:.1}%)", state, count, percentage);
        }

        if let Some(run) = &source.latest_run {
            let c = &run.counters;
            println!(
                "  Latest run #{} ({}): {} inserted, {} retried, {} skipped, {} downloaded, {} failed",
                run.id,
                run.status.to_db_string(),
                c.inserted,
                c.retried,
                c.skipped,
                c.downloaded,
                c.failed
            );
        }
        println!();
    }
}
