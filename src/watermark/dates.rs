//! Normalized date comparison for record filed dates
//!
//! Sources are inconsistent about how they write dates, so filed dates are
//! parsed against a fixed list of known layouts. A value that matches none of
//! them is reported back to the caller instead of failing the cycle.

use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;

/// Known layouts, tried in order
///
/// Four-digit-year layouts come first; a `%Y` match with a year below 1000 is
/// rejected so that `"01/06/24"` falls through to the `%y` layouts.
const KNOWN_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d/%b/%Y",
    "%d-%b-%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%d/%m/%y",
    "%d-%m-%y",
    "%d/%b/%y",
    "%d-%b-%y",
];

/// Parses a date written in any of the known layouts
pub fn parse_loose(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    KNOWN_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .filter(|date| !format.contains("%Y") || date.year() >= 1000)
    })
}

/// Compares two loosely formatted dates; `None` when either cannot be parsed
pub fn compare_dates(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_loose(a)?.cmp(&parse_loose(b)?))
}

/// Outcome of offering a filed date to the running watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced,
    Unchanged,
    Unparseable,
}

/// In-memory watermark for one cycle; it only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningWatermark {
    current: NaiveDate,
}

impl RunningWatermark {
    pub fn new(start: NaiveDate) -> Self {
        Self { current: start }
    }

    pub fn current(&self) -> NaiveDate {
        self.current
    }

    /// Keeps the later of the current watermark and `filed_date`
    pub fn observe(&mut self, filed_date: &str) -> Advance {
        match parse_loose(filed_date) {
            Some(date) => self.observe_date(date),
            None => Advance::Unparseable,
        }
    }

    pub fn observe_date(&mut self, date: NaiveDate) -> Advance {
        if date > self.current {
            self.current = date;
            Advance::Advanced
        } else {
            Advance::Unchanged
        }
    }

    /// Caps the watermark just below `date`, never below `floor`
    pub fn cap_before(&mut self, date: NaiveDate, floor: NaiveDate) {
        if let Some(day_before) = date.pred_opt() {
            if self.current > day_before {
                self.current = day_before.max(floor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_known_layouts() {
        assert_eq!(parse_loose("05/06/2024"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose("05-06-2024"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose("05/06/24"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose("05-06-24"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose("05/Jun/2024"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose("2024-06-05"), Some(d(2024, 6, 5)));
        assert_eq!(parse_loose(" 05/06/2024 "), Some(d(2024, 6, 5)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_loose(""), None);
        assert_eq!(parse_loose("June fifth"), None);
        assert_eq!(parse_loose("31/02/2024"), None);
    }

    #[test]
    fn test_compare_across_layouts() {
        assert_eq!(compare_dates("05/06/2024", "2024-06-04"), Some(Ordering::Greater));
        assert_eq!(compare_dates("05-Jun-2024", "05/06/24"), Some(Ordering::Equal));
        assert_eq!(compare_dates("05/06/2024", "soon"), None);
    }

    #[test]
    fn test_running_watermark_is_monotone() {
        let mut wm = RunningWatermark::new(d(2024, 6, 1));
        assert_eq!(wm.observe("03/06/2024"), Advance::Advanced);
        assert_eq!(wm.observe("02/06/2024"), Advance::Unchanged);
        assert_eq!(wm.observe("not a date"), Advance::Unparseable);
        assert_eq!(wm.observe("10/06/2024"), Advance::Advanced);
        assert_eq!(wm.current(), d(2024, 6, 10));
    }

    #[test]
    fn test_running_watermark_order_independent() {
        let dates = ["04/06/2024", "01/06/2024", "09/06/2024", "07/06/2024"];
        let mut forward = RunningWatermark::new(d(2024, 5, 1));
        let mut backward = RunningWatermark::new(d(2024, 5, 1));
        for date in dates.iter() {
            forward.observe(date);
        }
        for date in dates.iter().rev() {
            backward.observe(date);
        }
        assert_eq!(forward.current(), d(2024, 6, 9));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_cap_before_respects_floor() {
        let mut wm = RunningWatermark::new(d(2024, 6, 10));
        wm.cap_before(d(2024, 6, 5), d(2024, 6, 1));
        assert_eq!(wm.current(), d(2024, 6, 4));

        let mut wm = RunningWatermark::new(d(2024, 6, 10));
        wm.cap_before(d(2024, 5, 20), d(2024, 6, 1));
        assert_eq!(wm.current(), d(2024, 6, 1));
    }
}
