/// Processing state definitions for stored documents
///
/// A document is created `New` by the dedup gate, moved to `DownloadedOk` or
/// `Failed` by the fetcher, and marked `AlreadyComplete` by downstream
/// processing once nothing more needs to happen to it.
use std::fmt;

/// Represents where a stored document is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingState {
    /// Admitted, artifact not fetched yet (or a fetch was interrupted)
    New,

    /// Artifact downloaded and written to its content-addressed path
    DownloadedOk,

    /// Last fetch attempt failed; the row is kept as a retryable tombstone
    Failed,

    /// Fully processed; re-crawls must not touch it again
    AlreadyComplete,
}

impl ProcessingState {
    /// Numeric status code used by downstream consumers
    ///
    /// `New` and `DownloadedOk` share code 0: both mean "no error so far".
    pub fn code(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::DownloadedOk => 0,
            Self::Failed => 2,
            Self::AlreadyComplete => 10,
        }
    }

    /// Returns true if the artifact still has to be downloaded
    ///
    /// Re-crawls hand these documents out for another attempt; the rest are
    /// skipped by the dedup gate.
    pub fn needs_fetch(&self) -> bool {
        matches!(self, Self::New | Self::Failed)
    }

    /// Returns true if a fetch call has concluded for this document
    pub fn is_fetch_outcome(&self) -> bool {
        matches!(self, Self::DownloadedOk | Self::Failed)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::DownloadedOk => "downloaded_ok",
            Self::Failed => "failed",
            Self::AlreadyComplete => "already_complete",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "downloaded_ok" => Some(Self::DownloadedOk),
            "failed" => Some(Self::Failed),
            "already_complete" => Some(Self::AlreadyComplete),
            _ => None,
        }
    }

    /// Returns all possible processing states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::New,
            Self::DownloadedOk,
            Self::Failed,
            Self::AlreadyComplete,
        ]
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
