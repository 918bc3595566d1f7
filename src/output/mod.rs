//! Output module for cycle reports and ingestion statistics
//!
//! This module handles:
//! - Printing the outcome of each crawl cycle
//! - Printing the ranges a dry run would scan
//! - Loading and printing per-source statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, SourceStatistics};

use crate::cycle::{CycleReport, PlannedRange};
use crate::IngestError;

/// Prints the outcome of one source's cycle
pub fn print_cycle_report(report: &CycleReport) {
    let c = &report.counters;
    println!("Source {}: {}", report.source_id, report.status.to_db_string());
    println!(
        "  Records: {} inserted, {} retried, {} skipped",
        c.inserted, c.retried, c.skipped
    );
    println!("  Artifacts: {} downloaded, {} failed", c.downloaded, c.failed);

    match &report.watermark_after {
        Some(after) => println!("  Watermark: {} -> {}", report.watermark_before, after),
        None => println!("  Watermark: {} (unchanged)", report.watermark_before),
    }

    if report.duplicates_reported > 0 {
        println!("  Duplicates of downloaded documents: {}", report.duplicates_reported);
    }
    if report.malformed_records > 0 {
        println!("  Malformed entries skipped: {}", report.malformed_records);
    }
    if report.unparseable_dates > 0 {
        println!("  Unparseable filed dates: {}", report.unparseable_dates);
    }
    for range in &report.overflowed_ranges {
        println!("  OVERFLOW: {} exceeds the source result cap", range);
    }
}

/// Prints the ranges a cycle would scan without running it
pub fn print_plan(source_id: &str, watermark: &str, planned: &[PlannedRange]) {
    println!("Source {} (watermark {}):", source_id, watermark);
    for planned_range in planned {
        let kind = if planned_range.retro { "retro" } else { "primary" };
        println!("  {} [{}]", planned_range.range, kind);
    }
}

/// Prints a failed cycle
pub fn print_cycle_error(source_id: &str, error: &IngestError) {
    println!("Source {}: failed", source_id);
    println!("  Error: {}", error);
}
