//! Artifact downloading
//!
//! This module handles every artifact download of a crawl cycle:
//! - Building HTTP clients with the identifying user agent
//! - Routing each request through the next proxy of the pool
//! - Writing artifacts to their deterministic location
//! - Recording the outcome of every attempt in the document store

mod client;
mod resilient;
mod sink;

pub use client::build_http_client;
pub use resilient::{artifact_path, FetchResult, ResilientFetcher};
pub use sink::{ArtifactSink, FsArtifactSink};
