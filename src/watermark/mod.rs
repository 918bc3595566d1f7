//! Watermark module: where each source resumes from
//!
//! This module contains everything date-related in a crawl cycle:
//! - `DateRange`: an inclusive range of calendar days
//! - `DateWatermark`: the persisted "crawled through" marker and the policy that
//!   turns it into the next ranges to scan
//! - `RunningWatermark`: the in-memory, monotone watermark advanced per record
//! - `RangeSplitter`: bisects ranges whose result count exceeds a source cap

mod dates;
mod policy;
mod splitter;

pub use dates::{compare_dates, parse_loose, Advance, RunningWatermark};
pub use policy::{chunk_weekly, next_range, retro_ranges, DateWatermark, RETRO_MONTHS};
pub use splitter::{resolve, RangeSplitter, SplitError, SplitStep};

use chrono::{Duration, NaiveDate};
use std::fmt;
use thiserror::Error;

/// Errors raised while reading a persisted watermark
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Malformed watermark '{value}' (expected format '{format}')")]
    MalformedWatermark { value: String, format: String },
}

/// An inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn is_single_day(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Splits at the midpoint day into `[start, mid]` and `[mid + 1, end]`
    ///
    /// Returns `None` for a single-day range.
    pub fn bisect(&self) -> Option<(DateRange, DateRange)> {
        if self.is_single_day() {
            return None;
        }
        let mid = self.start + Duration::days((self.end - self.start).num_days() / 2);
        Some((
            DateRange::new(self.start, mid),
            DateRange::new(mid + Duration::days(1), self.end),
        ))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
