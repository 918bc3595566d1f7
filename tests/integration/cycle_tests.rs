//! Single-cycle behavior: downloads, watermark advancement, splitting and
//! structural failures

use crate::common::{create_adapter, create_cycle, create_test_config, create_test_source, entry};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use sumi_docket::adapter::SourceAdapter;
use sumi_docket::state::ProcessingState;
use sumi_docket::storage::{RunStatus, Storage};
use sumi_docket::{DateRange, IngestError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

async fn mount_artifact(server: &MockServer, file: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", file)))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(b"%PDF-1.4 test".to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_cycle_downloads_and_advances_watermark() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    // Wednesday: the range runs from the watermark to today
    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .and(query_param("from", "01/06/2024"))
        .and(query_param("to", "12/06/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            entry("1", "07/06/2024", &format!("{}/files/1.pdf", base)),
            entry("2", "10/06/2024", &format!("{}/files/2.pdf", base)),
            entry("3", "04/06/2024", &format!("{}/files/3.pdf", base)),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf", 200).await;
    mount_artifact(&server, "2.pdf", 500).await;
    mount_artifact(&server, "3.pdf", 200).await;

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .expect("Cycle should succeed despite a failed download");

    assert!(report.is_success());
    assert_eq!(report.counters.inserted, 3);
    assert_eq!(report.counters.downloaded, 2);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(
        report.processed_ranges,
        vec![DateRange::new(d(2024, 6, 1), d(2024, 6, 12))]
    );

    // Max over all admitted dates, regardless of arrival order
    assert_eq!(report.watermark_after.as_deref(), Some("10/06/2024"));

    let storage = cycle.storage().lock().unwrap();
    let row = storage.get_crawl_config("court").unwrap().unwrap();
    assert_eq!(row.crawled_through, "10/06/2024");
    assert!(row.last_crawl_timestamp.is_some());

    // Every fetched document ends in a fetch outcome state
    assert_eq!(storage.count_documents("court").unwrap(), 3);
    assert_eq!(
        storage
            .count_documents_by_state("court", ProcessingState::New)
            .unwrap(),
        0
    );
    assert_eq!(
        storage
            .count_documents_by_state("court", ProcessingState::DownloadedOk)
            .unwrap(),
        2
    );

    let artifacts = temp.path().join("artifacts/opinions/north/2024");
    let written = std::fs::read_dir(&artifacts).unwrap().count();
    assert_eq!(written, 2);

    let run = storage.get_latest_run("court").unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counters, report.counters);
}

#[tokio::test]
async fn test_sunday_catch_up_ignores_watermark() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .and(query_param("from", "02/06/2024"))
        .and(query_param("to", "09/06/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 9))
        .await
        .unwrap();

    assert_eq!(
        report.processed_ranges,
        vec![DateRange::new(d(2024, 6, 2), d(2024, 6, 9))]
    );
    // Nothing admitted, so the watermark is rewritten unchanged
    assert_eq!(report.watermark_after.as_deref(), Some("01/06/2024"));
}

#[tokio::test]
async fn test_overflowing_range_is_split() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    for (from, to, count) in [
        ("01/06/2024", "12/06/2024", 1500),
        ("01/06/2024", "06/06/2024", 600),
        ("07/06/2024", "12/06/2024", 900),
    ] {
        Mock::given(method("GET"))
            .and(path("/court/opinions/count"))
            .and(query_param("from", from))
            .and(query_param("to", to))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": count })))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .and(query_param("from", "01/06/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry(
            "1",
            "03/06/2024",
            &format!("{}/files/1.pdf", base)
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .and(query_param("from", "07/06/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry(
            "2",
            "11/06/2024",
            &format!("{}/files/2.pdf", base)
        )])))
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf", 200).await;
    mount_artifact(&server, "2.pdf", 200).await;

    let mut source = create_test_source("court", &base, "01/06/2024");
    source.result_limit = Some(1000);
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .unwrap();

    assert_eq!(
        report.processed_ranges,
        vec![
            DateRange::new(d(2024, 6, 1), d(2024, 6, 6)),
            DateRange::new(d(2024, 6, 7), d(2024, 6, 12)),
        ]
    );
    assert!(report.overflowed_ranges.is_empty());
    assert_eq!(report.counters.downloaded, 2);
    assert_eq!(report.watermark_after.as_deref(), Some("11/06/2024"));
}

#[tokio::test]
async fn test_single_day_overflow_holds_back_watermark() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    for (from, to, count) in [
        ("10/06/2024", "12/06/2024", 1500),
        ("10/06/2024", "11/06/2024", 20),
        ("12/06/2024", "12/06/2024", 5000),
    ] {
        Mock::given(method("GET"))
            .and(path("/court/opinions/count"))
            .and(query_param("from", from))
            .and(query_param("to", to))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": count })))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .and(query_param("from", "10/06/2024"))
        .and(query_param("to", "11/06/2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry(
            "1",
            "11/06/2024",
            &format!("{}/files/1.pdf", base)
        )])))
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf", 200).await;

    let mut source = create_test_source("court", &base, "10/06/2024");
    source.result_limit = Some(1000);
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.overflowed_ranges,
        vec![DateRange::new(d(2024, 6, 12), d(2024, 6, 12))]
    );
    assert_eq!(
        report.processed_ranges,
        vec![DateRange::new(d(2024, 6, 10), d(2024, 6, 11))]
    );
    // The overflowing day stays ahead of the watermark
    assert_eq!(report.watermark_after.as_deref(), Some("11/06/2024"));
}

#[tokio::test]
async fn test_malformed_entry_does_not_stall_source() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            entry("1", "05/06/2024", &format!("{}/files/1.pdf", base)),
            { "external_id": "2", "filed_date": "08/06/2024" },
            entry("3", "10/06/2024", &format!("{}/files/3.pdf", base)),
        ])))
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf", 200).await;
    mount_artifact(&server, "3.pdf", 200).await;

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .expect("A malformed entry must not abort the cycle");

    assert!(report.is_success());
    assert_eq!(report.malformed_records, 1);
    assert_eq!(report.counters.inserted, 2);
    assert_eq!(report.counters.downloaded, 2);
    // The entry after the malformed one still moves the watermark
    assert_eq!(report.watermark_after.as_deref(), Some("10/06/2024"));

    // The next cycle sees the same listing and still completes
    let next = cycle
        .run_source(&source, &adapter, d(2024, 6, 13))
        .await
        .unwrap();
    assert!(next.is_success());
    assert_eq!(next.malformed_records, 1);

    let storage = cycle.storage().lock().unwrap();
    assert_eq!(storage.count_documents("court").unwrap(), 2);
    assert_eq!(
        storage.get_crawl_config("court").unwrap().unwrap().crawled_through,
        "10/06/2024"
    );
}

#[tokio::test]
async fn test_unreachable_source_leaves_watermark_untouched() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let result = cycle.run_source(&source, &adapter, d(2024, 6, 12)).await;
    assert!(matches!(result, Err(IngestError::Adapter(_))));

    let storage = cycle.storage().lock().unwrap();
    let row = storage.get_crawl_config("court").unwrap().unwrap();
    assert_eq!(row.crawled_through, "01/06/2024");
    assert!(row.last_crawl_timestamp.is_none());
    assert_eq!(
        storage.get_latest_run("court").unwrap().unwrap().status,
        RunStatus::Failed
    );
}

#[tokio::test]
async fn test_sources_run_independently() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/north/opinions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry(
            "1",
            "05/06/2024",
            &format!("{}/files/1.pdf", base)
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/south/opinions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf", 200).await;

    let north = create_test_source("north", &base, "01/06/2024");
    let south = create_test_source("south", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![north.clone(), south.clone()]);
    let cycle = create_cycle(&config);

    let jobs: Vec<(_, Arc<dyn SourceAdapter>)> = vec![
        (north.clone(), Arc::new(create_adapter(&config, &north))),
        (south.clone(), Arc::new(create_adapter(&config, &south))),
    ];
    let mut results = cycle.run_all(jobs, d(2024, 6, 12), 2).await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(results[0].0, "north");
    assert!(results[0].1.as_ref().unwrap().is_success());
    assert_eq!(results[1].0, "south");
    assert!(results[1].1.is_err());

    let storage = cycle.storage().lock().unwrap();
    assert_eq!(
        storage.get_crawl_config("north").unwrap().unwrap().crawled_through,
        "05/06/2024"
    );
    assert_eq!(
        storage.get_crawl_config("south").unwrap().unwrap().crawled_through,
        "01/06/2024"
    );
}
