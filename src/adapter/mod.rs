//! Source adapters
//!
//! A source adapter turns a date range into candidate records for one external
//! site. Adapters must yield records in their final order; the cycle never
//! re-sorts them.

mod json_listing;

pub use json_listing::JsonListingAdapter;

use crate::dedup::CandidateRecord;
use crate::watermark::DateRange;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors raised by a source adapter
///
/// Errors returned for a whole range are structural: the cycle that sees one
/// stops without moving the watermark. Record-level errors yielded inside a
/// [`RecordStream`] only disqualify that one entry.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Failed to decode source response: {0}")]
    Decode(String),

    #[error("Record is missing field '{0}'")]
    MissingField(String),

    #[error("Source '{0}' has no result-count endpoint")]
    CountUnavailable(String),
}

impl AdapterError {
    /// Returns true if the error concerns a single listing entry
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}

/// Lazily produced records of one range, in source order
pub type RecordStream = BoxStream<'static, Result<CandidateRecord, AdapterError>>;

/// One external record source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Identifier of the source; matches its crawl config row
    fn source_id(&self) -> &str;

    /// Number of results the source reports for `range`
    async fn count_for_range(&self, range: DateRange) -> Result<u64, AdapterError>;

    /// Records filed within `range`
    async fn fetch_range(&self, range: DateRange) -> Result<RecordStream, AdapterError>;
}
