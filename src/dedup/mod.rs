//! Deduplication gate
//!
//! Every candidate record passes through [`DedupGate::admit`] exactly once per
//! cycle. The gate guarantees that a natural key is stored at most once per
//! source and that documents whose artifact is already on disk are never
//! handed out again.

mod record;

pub use record::{CandidateRecord, Classification, NaturalKey};

use crate::config::DuplicatePolicy;
use crate::state::ProcessingState;
use crate::storage::{Storage, StorageResult};
use tracing::{debug, warn};

/// Result of admitting one candidate record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First sighting; a `New` document was stored with this id
    Inserted(i64),
    /// Artifact already downloaded or fully processed; nothing to do
    AlreadyTerminal,
    /// Seen before but never downloaded; fetch again under this id
    RetryCandidate(i64),
}

impl DedupOutcome {
    /// Document id to fetch, if any
    pub fn document_id(&self) -> Option<i64> {
        match self {
            Self::Inserted(id) | Self::RetryCandidate(id) => Some(*id),
            Self::AlreadyTerminal => None,
        }
    }
}

/// Admits candidate records into the document store
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupGate {
    policy: DuplicatePolicy,
}

impl DedupGate {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Looks the record up by natural key and stores it if it is new
    ///
    /// Atomicity comes from the store: the insert is conditional on the natural
    /// key being free, and a lost race is resolved by re-reading the winner.
    pub fn admit<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        source_id: &str,
        record: &CandidateRecord,
    ) -> StorageResult<DedupOutcome> {
        let digest = record.key.digest();

        if let Some(existing) = storage.find_document(source_id, &digest)? {
            return Ok(self.classify_existing(source_id, record, existing.id, existing.state));
        }

        match storage.insert_document(source_id, record)? {
            Some(id) => {
                debug!(
                    "Source {}: admitted record {} as document {}",
                    source_id,
                    record.key.to_json(),
                    id
                );
                Ok(DedupOutcome::Inserted(id))
            }
            None => {
                let existing = storage.find_document(source_id, &digest)?;
                match existing {
                    Some(doc) => Ok(self.classify_existing(source_id, record, doc.id, doc.state)),
                    // Insert lost a race to a row that is gone again; treat as fresh
                    None => match storage.insert_document(source_id, record)? {
                        Some(id) => Ok(DedupOutcome::Inserted(id)),
                        None => Ok(DedupOutcome::AlreadyTerminal),
                    },
                }
            }
        }
    }

    fn classify_existing(
        &self,
        source_id: &str,
        record: &CandidateRecord,
        id: i64,
        state: ProcessingState,
    ) -> DedupOutcome {
        if state.needs_fetch() {
            debug!(
                "Source {}: document {} seen before in state {}, retrying",
                source_id, id, state
            );
            return DedupOutcome::RetryCandidate(id);
        }

        match self.policy {
            DuplicatePolicy::Skip => {
                debug!("Source {}: skipping {} document {}", source_id, state, id);
            }
            DuplicatePolicy::Report => {
                warn!(
                    "Source {}: record {} duplicates {} document {}",
                    source_id,
                    record.key.to_json(),
                    state,
                    id
                );
            }
        }
        DedupOutcome::AlreadyTerminal
    }
}
