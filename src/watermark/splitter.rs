//! Range splitting for sources that cap their result counts
//!
//! When a source returns at most `limit` results per query, a range whose
//! count reaches the limit is bisected until every piece fits. Pieces are
//! handed out earliest first so downstream watermark tracking sees dates in
//! increasing order.

use crate::watermark::DateRange;
use thiserror::Error;

/// Errors raised while splitting a range
#[derive(Debug, Error)]
pub enum SplitError {
    /// A single day already exceeds the cap, so results would be lost
    #[error("Single day {range} has {count} results, exceeding the source cap of {limit}")]
    UnsplittableOverflow {
        range: DateRange,
        count: u64,
        limit: u64,
    },
}

/// What to do with a range once its result count is known
#[derive(Debug)]
pub enum SplitStep {
    /// The range fits under the cap and can be processed
    Process(DateRange),
    /// The range was bisected; both halves are now pending
    Split,
    /// A single day exceeded the cap
    Overflow(SplitError),
}

/// Work queue of ranges still waiting for a result count
///
/// The splitter does no I/O. Callers pull a range with [`next_range`], count
/// it however they like, and report back through [`settle`].
///
/// [`next_range`]: RangeSplitter::next_range
/// [`settle`]: RangeSplitter::settle
#[derive(Debug)]
pub struct RangeSplitter {
    limit: u64,
    // Stack; the earliest pending range sits on top.
    pending: Vec<DateRange>,
}

impl RangeSplitter {
    pub fn new(range: DateRange, limit: u64) -> Self {
        Self {
            limit,
            pending: vec![range],
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The next range to count, earliest first
    pub fn next_range(&mut self) -> Option<DateRange> {
        self.pending.pop()
    }

    /// Decides what happens to `range` given its result count
    pub fn settle(&mut self, range: DateRange, count: u64) -> SplitStep {
        if count < self.limit {
            return SplitStep::Process(range);
        }

        match range.bisect() {
            Some((earlier, later)) => {
                tracing::debug!(
                    "Range {} has {} results (cap {}), splitting into {} and {}",
                    range,
                    count,
                    self.limit,
                    earlier,
                    later
                );
                self.pending.push(later);
                self.pending.push(earlier);
                SplitStep::Split
            }
            None => SplitStep::Overflow(SplitError::UnsplittableOverflow {
                range,
                count,
                limit: self.limit,
            }),
        }
    }
}

/// Resolves `range` against `limit`, calling `process` on every piece that fits
///
/// Pieces are processed in date order. A single day over the cap aborts with
/// [`SplitError::UnsplittableOverflow`] instead of silently truncating.
pub fn resolve<C, P>(
    range: DateRange,
    mut result_counter: C,
    limit: u64,
    mut process: P,
) -> Result<(), SplitError>
where
    C: FnMut(&DateRange) -> u64,
    P: FnMut(DateRange),
{
    let mut splitter = RangeSplitter::new(range, limit);
    while let Some(next) = splitter.next_range() {
        let count = result_counter(&next);
        match splitter.settle(next, count) {
            SplitStep::Process(piece) => process(piece),
            SplitStep::Split => {}
            SplitStep::Overflow(err) => return Err(err),
        }
    }
    Ok(())
}
