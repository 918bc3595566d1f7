//! Crawl cycle orchestration
//!
//! One cycle takes one source from its persisted watermark to a new one:
//! compute ranges, split them under the source's result cap, admit every
//! record through the dedup gate, fetch artifacts, then persist the advanced
//! watermark.

mod orchestrator;

pub use orchestrator::{plan_ranges, CrawlCycle};

use crate::storage::{RunCounters, RunStatus};
use crate::watermark::DateRange;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared by every running cycle
///
/// Cycles check the flag between records, so a record is either fully
/// admitted and fetched or left for the next cycle.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A range the cycle intends to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedRange {
    pub range: DateRange,
    /// Deep re-check range rather than part of the primary window
    pub retro: bool,
}

/// Summary of one source's cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub source_id: String,
    pub status: RunStatus,
    pub counters: RunCounters,
    /// Sub-ranges that were handed to the adapter, in order
    pub processed_ranges: Vec<DateRange>,
    /// Single days whose result count exceeded the source cap
    pub overflowed_ranges: Vec<DateRange>,
    pub unparseable_dates: u64,
    /// Listing entries skipped because they could not be read as records
    pub malformed_records: u64,
    pub duplicates_reported: u64,
    pub watermark_before: String,
    /// Persisted watermark; `None` when the cycle did not persist one
    pub watermark_after: Option<String>,
}

impl CycleReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            status: RunStatus::Running,
            counters: RunCounters::default(),
            processed_ranges: Vec::new(),
            overflowed_ranges: Vec::new(),
            unparseable_dates: 0,
            malformed_records: 0,
            duplicates_reported: 0,
            watermark_before: String::new(),
            watermark_after: None,
        }
    }

    /// True when the cycle ran to completion, per-record failures included
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
