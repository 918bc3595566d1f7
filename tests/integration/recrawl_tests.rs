//! Re-crawl behavior: idempotent admission, terminal documents and retries

use crate::common::{create_adapter, create_cycle, create_test_config, create_test_source, entry};
use chrono::NaiveDate;
use serde_json::json;
use sumi_docket::config::DuplicatePolicy;
use sumi_docket::state::ProcessingState;
use sumi_docket::storage::Storage;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

async fn mount_listing(server: &MockServer, entries: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/court/opinions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

async fn mount_artifact(server: &MockServer, file: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}", file)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 test".to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_recrawl_does_not_download_twice() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    mount_listing(
        &server,
        json!([
            entry("1", "05/06/2024", &format!("{}/files/1.pdf", base)),
            entry("2", "06/06/2024", &format!("{}/files/2.pdf", base)),
        ]),
    )
    .await;
    for file in ["1.pdf", "2.pdf"] {
        Mock::given(method("GET"))
            .and(path(format!("/files/{}", file)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 test".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let first = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .unwrap();
    assert_eq!(first.counters.inserted, 2);
    assert_eq!(first.counters.downloaded, 2);

    // The same listing served again on a weekday and on the Sunday catch-up
    for today in [d(2024, 6, 13), d(2024, 6, 16)] {
        let report = cycle.run_source(&source, &adapter, today).await.unwrap();
        assert_eq!(report.counters.inserted, 0);
        assert_eq!(report.counters.retried, 0);
        assert_eq!(report.counters.skipped, 2);
        assert_eq!(report.counters.downloaded, 0);
        assert_eq!(report.duplicates_reported, 0);
    }

    let storage = cycle.storage().lock().unwrap();
    assert_eq!(storage.count_documents("court").unwrap(), 2);
    assert_eq!(
        storage
            .count_documents_by_state("court", ProcessingState::DownloadedOk)
            .unwrap(),
        2
    );
    assert_eq!(storage.get_document(1).unwrap().attempts, 1);
}

#[tokio::test]
async fn test_completed_documents_are_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    mount_listing(
        &server,
        json!([entry("1", "05/06/2024", &format!("{}/files/1.pdf", base))]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 test".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut source = create_test_source("court", &base, "01/06/2024");
    source.duplicate_policy = DuplicatePolicy::Report;
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .unwrap();

    // Downstream processing marks the document done
    {
        let mut storage = cycle.storage().lock().unwrap();
        assert_eq!(storage.count_documents("court").unwrap(), 1);
        storage
            .set_processing_state(1, ProcessingState::AlreadyComplete)
            .unwrap();
    }

    let report = cycle
        .run_source(&source, &adapter, d(2024, 6, 13))
        .await
        .unwrap();
    assert_eq!(report.counters.skipped, 1);
    assert_eq!(report.counters.retried, 0);
    assert_eq!(report.counters.downloaded, 0);
    assert_eq!(report.duplicates_reported, 1);

    let storage = cycle.storage().lock().unwrap();
    assert_eq!(storage.get_document(1).unwrap().attempts, 1);
}

#[tokio::test]
async fn test_failed_fetch_is_retried_next_cycle() {
    let server = MockServer::start().await;
    let base = server.uri();
    let temp = TempDir::new().unwrap();

    mount_listing(
        &server,
        json!([entry("1", "05/06/2024", &format!("{}/files/1.pdf", base))]),
    )
    .await;
    // First attempt fails, later ones succeed
    Mock::given(method("GET"))
        .and(path("/files/1.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_artifact(&server, "1.pdf").await;

    let source = create_test_source("court", &base, "01/06/2024");
    let config = create_test_config(&temp, vec![source.clone()]);
    let cycle = create_cycle(&config);
    let adapter = create_adapter(&config, &source);

    let first = cycle
        .run_source(&source, &adapter, d(2024, 6, 12))
        .await
        .unwrap();
    assert_eq!(first.counters.failed, 1);
    // A failed fetch still advances the watermark
    assert_eq!(first.watermark_after.as_deref(), Some("05/06/2024"));

    let (id, error) = {
        let storage = cycle.storage().lock().unwrap();
        let doc = storage.get_document(1).unwrap();
        assert_eq!(doc.state, ProcessingState::Failed);
        assert!(doc.artifact_path.is_none());
        (doc.id, doc.error_message.clone())
    };
    assert!(error.unwrap().contains("500"));

    let second = cycle
        .run_source(&source, &adapter, d(2024, 6, 13))
        .await
        .unwrap();
    assert_eq!(second.counters.retried, 1);
    assert_eq!(second.counters.downloaded, 1);

    let storage = cycle.storage().lock().unwrap();
    let doc = storage.get_document(id).unwrap();
    assert_eq!(doc.state, ProcessingState::DownloadedOk);
    assert_eq!(doc.attempts, 2);
    assert!(doc.error_message.is_none());
    assert!(doc.artifact_path.is_some());
}
