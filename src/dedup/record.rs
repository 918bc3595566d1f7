//! Candidate records and their natural keys

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The attributes that identify the underlying document of a record
///
/// Attribute order does not matter; the key is canonicalized by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaturalKey {
    parts: BTreeMap<String, String>,
}

impl NaturalKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parts.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// SHA-256 over the length-prefixed attributes, hex encoded
    ///
    /// Length prefixes keep `("a", "bc")` and `("ab", "c")` apart.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.parts {
            hasher.update(format!("{}:{}{}:{}", name.len(), name, value.len(), value));
        }
        hex::encode(hasher.finalize())
    }

    /// Readable form stored next to the digest
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.parts).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok().map(|parts| Self { parts })
    }
}

/// Where a document's artifact lives in the artifact tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub region: String,
    pub sub_category: Option<String>,
    pub year: Option<i32>,
}

/// One record yielded by a source adapter during a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub key: NaturalKey,
    /// Date as written by the source; drives watermark advancement
    pub filed_date: String,
    pub download_url: String,
    pub classification: Classification,
    /// Everything else the adapter extracted
    pub payload: Value,
}
