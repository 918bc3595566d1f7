//! State module for tracking ingestion progress
//!
//! # Components
//!
//! - `ProcessingState`: lifecycle of a stored document (new, downloaded, failed, complete)
//! - `CycleState`: phase of a single source's crawl cycle

mod cycle_state;
mod processing_state;

// Re-export main types
pub use cycle_state::CycleState;
pub use processing_state::ProcessingState;
