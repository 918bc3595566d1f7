//! Integration tests for crawl cycles
//!
//! These tests use wiremock to stand in for record sources and artifact
//! hosts, and run full cycles against a file-backed database.

mod common;
mod cycle_tests;
mod recrawl_tests;
