//! Next-range policy for a source's watermark

use crate::watermark::{DateRange, WatermarkError};
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

/// Months looked back on every day when a source asks for retro checks
pub const RETRO_MONTHS: [u32; 4] = [1, 3, 6, 12];

/// Extra months looked back on Saturdays and Sundays
const WEEKEND_RETRO_MONTHS: [u32; 2] = [24, 36];

/// Computes the primary range(s) to scan
///
/// - Sunday: the last seven days, ignoring the watermark (weekly catch-up)
/// - Monday: the week before that, `[today - 14d, today - 7d]`
/// - otherwise: `[crawled_through, today]`
///
/// A watermark in the future collapses to `[today, today]`.
pub fn next_range(
    crawled_through: NaiveDate,
    today: NaiveDate,
    weekday: Weekday,
) -> Vec<DateRange> {
    match weekday {
        Weekday::Sun => vec![DateRange::new(today - Duration::days(7), today)],
        Weekday::Mon => vec![DateRange::new(
            today - Duration::days(14),
            today - Duration::days(7),
        )],
        _ => vec![DateRange::new(crawled_through.min(today), today)],
    }
}

/// Candidate deep re-check ranges: one week starting N months ago
///
/// These are never merged into the primary range; the caller decides whether
/// to run them.
pub fn retro_ranges(today: NaiveDate, weekday: Weekday) -> Vec<DateRange> {
    let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);
    RETRO_MONTHS
        .iter()
        .chain(WEEKEND_RETRO_MONTHS.iter().filter(|_| weekend))
        .filter_map(|months| today.checked_sub_months(Months::new(*months)))
        .map(|start| DateRange::new(start, (start + Duration::days(6)).min(today)))
        .collect()
}

/// Splits a range into consecutive chunks of at most seven days
pub fn chunk_weekly(range: DateRange) -> Vec<DateRange> {
    let mut chunks = Vec::new();
    let mut start = range.start;
    while start <= range.end {
        let end = (start + Duration::days(6)).min(range.end);
        chunks.push(DateRange::new(start, end));
        start = end + Duration::days(1);
    }
    chunks
}

/// A source's persisted "crawled through" marker in its own date format
#[derive(Debug, Clone)]
pub struct DateWatermark {
    date_format: String,
}

impl DateWatermark {
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Parses a persisted watermark strictly against the source's format
    pub fn parse(&self, value: &str) -> Result<NaiveDate, WatermarkError> {
        NaiveDate::parse_from_str(value.trim(), &self.date_format).map_err(|_| {
            WatermarkError::MalformedWatermark {
                value: value.to_string(),
                format: self.date_format.clone(),
            }
        })
    }

    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.date_format).to_string()
    }

    /// Parses the persisted value and applies [`next_range`] for `today`
    pub fn next_range(
        &self,
        crawled_through: &str,
        today: NaiveDate,
    ) -> Result<Vec<DateRange>, WatermarkError> {
        let watermark = self.parse(crawled_through)?;
        Ok(next_range(watermark, today, today.weekday()))
    }
}
