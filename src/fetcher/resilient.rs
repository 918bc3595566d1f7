//! Proxy-rotated artifact downloads with per-record bookkeeping
//!
//! A fetch never propagates transport or HTTP failures. Whatever happens on
//! the wire, exactly one row update is written for the document before the
//! call returns: `DownloadedOk` with the artifact path, or `Failed` with the
//! reason. Only a failure of that write itself is returned as an error.

use crate::config::{Config, UserAgentConfig};
use crate::fetcher::build_http_client;
use crate::fetcher::sink::ArtifactSink;
use crate::proxy::{ProxyEndpoint, ProxyRotator};
use crate::state::ProcessingState;
use crate::storage::{lock_storage, Storage, StoredDocument};
use crate::watermark::parse_loose;
use crate::IngestError;
use chrono::Datelike;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one artifact fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Artifact written to this path
    Success(PathBuf),
    /// Download failed; the document is tombstoned as `Failed`
    Failure(String),
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Downloads artifacts through the proxy pool and records the outcome
pub struct ResilientFetcher {
    direct: Client,
    proxied: HashMap<ProxyEndpoint, Client>,
    rotator: Option<Arc<ProxyRotator>>,
    sink: Arc<dyn ArtifactSink>,
    root: PathBuf,
}

impl ResilientFetcher {
    /// Creates a fetcher with one client per proxy endpoint
    pub fn new(
        user_agent: &UserAgentConfig,
        timeout: Duration,
        root: impl Into<PathBuf>,
        rotator: Option<Arc<ProxyRotator>>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self, IngestError> {
        let direct = build_http_client(user_agent, timeout, None)?;

        let mut proxied = HashMap::new();
        if let Some(rotator) = &rotator {
            for endpoint in rotator.endpoints() {
                let client = build_http_client(user_agent, timeout, Some(endpoint))?;
                proxied.insert(endpoint.clone(), client);
            }
        }

        Ok(Self {
            direct,
            proxied,
            rotator,
            sink,
            root: root.into(),
        })
    }

    /// Creates a fetcher from the loaded configuration
    pub fn from_config(
        config: &Config,
        rotator: Option<Arc<ProxyRotator>>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self, IngestError> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.crawler.fetch_timeout_secs),
            &config.crawler.artifact_root,
            rotator,
            sink,
        )
    }

    pub fn artifact_root(&self) -> &Path {
        &self.root
    }

    /// Downloads `url` for `doc` and records the outcome in the store
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResult)` - The outcome was recorded
    /// * `Err(IngestError)` - The outcome could not be recorded
    pub async fn fetch_artifact<S: Storage + ?Sized>(
        &self,
        storage: &Mutex<S>,
        doc: &StoredDocument,
        url: &str,
        extension: &str,
    ) -> Result<FetchResult, IngestError> {
        let path = artifact_path(&self.root, doc, extension);

        let result = match self.download(url, &path).await {
            Ok(()) => FetchResult::Success(path),
            Err(reason) => FetchResult::Failure(reason),
        };

        let mut store = lock_storage(storage)?;
        match &result {
            FetchResult::Success(path) => {
                debug!("Document {}: artifact written to {}", doc.id, path.display());
                let path = path.to_string_lossy();
                store.record_fetch_outcome(
                    doc.id,
                    ProcessingState::DownloadedOk,
                    Some(path.as_ref()),
                    None,
                )?;
            }
            FetchResult::Failure(reason) => {
                warn!("Document {}: download of {} failed: {}", doc.id, url, reason);
                store.record_fetch_outcome(
                    doc.id,
                    ProcessingState::Failed,
                    None,
                    Some(reason.as_str()),
                )?;
            }
        }

        Ok(result)
    }

    fn pick_client(&self) -> (&Client, Option<&ProxyEndpoint>) {
        let Some(rotator) = &self.rotator else {
            return (&self.direct, None);
        };

        let endpoint = rotator.next();
        match self.proxied.get(endpoint) {
            Some(client) => (client, Some(endpoint)),
            None => (&self.direct, None),
        }
    }

    async fn download(&self, url: &str, path: &Path) -> Result<(), String> {
        let (client, endpoint) = self.pick_client();

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                if let (Some(rotator), Some(endpoint)) = (&self.rotator, endpoint) {
                    rotator.report_failure(endpoint);
                }
                return Err(describe_transport_error(&e));
            }
        };

        // A response arrived, so the proxy itself is healthy
        if let (Some(rotator), Some(endpoint)) = (&self.rotator, endpoint) {
            rotator.report_success(endpoint);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| describe_transport_error(&e))?;
        if bytes.is_empty() {
            return Err("Empty response body".to_string());
        }

        if let Some(dir) = path.parent() {
            self.sink
                .ensure_dir(dir)
                .await
                .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
        }
        self.sink
            .write_artifact(path, &bytes)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}

/// Deterministic artifact location for a document
///
/// `root/category/region[/sub_category]/year/<natural key digest>.<ext>`.
/// The year comes from the classification, then from the filed date, and is
/// `undated` when neither is usable.
pub fn artifact_path(root: &Path, doc: &StoredDocument, extension: &str) -> PathBuf {
    let classification = &doc.classification;
    let mut path = root.to_path_buf();

    path.push(sanitize_segment(&classification.category));
    path.push(sanitize_segment(&classification.region));
    if let Some(sub) = &classification.sub_category {
        path.push(sanitize_segment(sub));
    }

    let year = classification
        .year
        .or_else(|| parse_loose(&doc.filed_date).map(|d| d.year()));
    match year {
        Some(year) => path.push(year.to_string()),
        None => path.push("undated"),
    }

    path.push(format!("{}.{}", doc.natural_key, extension));
    path
}

/// Makes a classification value safe to use as one path segment
fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned.to_string()
    }
}
