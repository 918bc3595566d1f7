//! Shared fixtures for the integration tests

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_docket::adapter::JsonListingAdapter;
use sumi_docket::config::{
    Config, CrawlerConfig, DuplicatePolicy, OutputConfig, SourceConfig, UserAgentConfig,
};
use sumi_docket::fetcher::{FsArtifactSink, ResilientFetcher};
use sumi_docket::storage::SqliteStorage;
use sumi_docket::{CancelFlag, CrawlCycle};
use tempfile::TempDir;

/// Creates a test configuration rooted in `temp`
pub fn create_test_config(temp: &TempDir, sources: Vec<SourceConfig>) -> Config {
    Config {
        crawler: CrawlerConfig {
            artifact_root: temp.path().join("artifacts").to_string_lossy().to_string(),
            fetch_timeout_secs: 5,
            max_concurrent_sources: 2,
            proxy_failure_threshold: 3,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: temp.path().join("docket.db").to_string_lossy().to_string(),
        },
        proxies: vec![],
        sources,
    }
}

/// A source served by the mock server under `/{id}`
pub fn create_test_source(id: &str, base_url: &str, seed: &str) -> SourceConfig {
    SourceConfig {
        id: id.to_string(),
        date_format: "%d/%m/%Y".to_string(),
        seed_watermark: seed.to_string(),
        listing_url: format!("{}/{}/opinions?from={{start}}&to={{end}}", base_url, id),
        count_url: Some(format!(
            "{}/{}/opinions/count?from={{start}}&to={{end}}",
            base_url, id
        )),
        result_limit: None,
        weekly_chunks: false,
        retro_lookback: false,
        duplicate_policy: DuplicatePolicy::Skip,
        key_fields: vec!["external_id".to_string()],
        category: "opinions".to_string(),
        region: "north".to_string(),
        artifact_extension: "pdf".to_string(),
    }
}

/// One listing entry as a source would publish it
pub fn entry(external_id: &str, filed_date: &str, download_url: &str) -> Value {
    json!({
        "external_id": external_id,
        "title": format!("State v. Doe #{}", external_id),
        "filed_date": filed_date,
        "download_url": download_url,
    })
}

/// Builds a cycle over the configured database and artifact root
pub fn create_cycle(config: &Config) -> CrawlCycle<SqliteStorage> {
    let storage = SqliteStorage::new(std::path::Path::new(&config.output.database_path))
        .expect("Failed to open database");
    let fetcher = ResilientFetcher::from_config(config, None, Arc::new(FsArtifactSink::new()))
        .expect("Failed to build fetcher");

    CrawlCycle::new(
        Arc::new(Mutex::new(storage)),
        Arc::new(fetcher),
        "test-hash",
        CancelFlag::new(),
    )
}

pub fn create_adapter(config: &Config, source: &SourceConfig) -> JsonListingAdapter {
    JsonListingAdapter::from_config(source, &config.user_agent, Duration::from_secs(5))
        .expect("Failed to build adapter")
}
