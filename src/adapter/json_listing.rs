//! Generic adapter for sources that publish a JSON listing per date range

use crate::adapter::{AdapterError, RecordStream, SourceAdapter};
use crate::config::{SourceConfig, UserAgentConfig};
use crate::dedup::{CandidateRecord, Classification, NaturalKey};
use crate::deferred::DeferredSequence;
use crate::fetcher::build_http_client;
use crate::watermark::DateRange;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Reads `{"count": n}` from the count endpoint and a JSON array of entries
/// from the listing endpoint
///
/// Entries are wrapped in a [`DeferredSequence`], so each raw entry is only
/// turned into a [`CandidateRecord`] when the cycle reaches it.
pub struct JsonListingAdapter {
    source: SourceConfig,
    client: Client,
}

impl JsonListingAdapter {
    pub fn new(source: SourceConfig, client: Client) -> Self {
        Self { source, client }
    }

    /// Builds the adapter with its own direct client
    pub fn from_config(
        source: &SourceConfig,
        user_agent: &UserAgentConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, timeout, None)?;
        Ok(Self::new(source.clone(), client))
    }

    /// Fills the `{start}` and `{end}` placeholders of a URL template
    pub fn url_for(&self, template: &str, range: DateRange) -> String {
        let format = &self.source.date_format;
        template
            .replace("{start}", &range.start.format(format).to_string())
            .replace("{end}", &range.end.format(format).to_string())
    }

    async fn get_json(&self, url: &str) -> Result<Value, AdapterError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AdapterError::Unreachable(format!("{}: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AdapterError::Decode(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl SourceAdapter for JsonListingAdapter {
    fn source_id(&self) -> &str {
        &self.source.id
    }

    async fn count_for_range(&self, range: DateRange) -> Result<u64, AdapterError> {
        let template = self
            .source
            .count_url
            .as_deref()
            .ok_or_else(|| AdapterError::CountUnavailable(self.source.id.clone()))?;
        let url = self.url_for(template, range);

        let body = self.get_json(&url).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| AdapterError::Decode(format!("{}: no integer 'count'", url)))
    }

    async fn fetch_range(&self, range: DateRange) -> Result<RecordStream, AdapterError> {
        let url = self.url_for(&self.source.listing_url, range);
        let body = self.get_json(&url).await?;

        let entries = match body {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(AdapterError::Decode(format!(
                        "{}: expected an array of entries",
                        url
                    )))
                }
            },
            _ => {
                return Err(AdapterError::Decode(format!(
                    "{}: expected an array of entries",
                    url
                )))
            }
        };

        debug!(
            "Source {}: listing for {} has {} entries",
            self.source.id,
            range,
            entries.len()
        );

        let extractor = RecordExtractor::from_source(&self.source);
        let sequence =
            DeferredSequence::new(entries, move |entry: &Value| extractor.extract(entry));
        Ok(stream::iter(sequence).boxed())
    }
}

/// Typed extraction of one listing entry
#[derive(Debug, Clone)]
struct RecordExtractor {
    key_fields: Vec<String>,
    category: String,
    region: String,
}

impl RecordExtractor {
    fn from_source(source: &SourceConfig) -> Self {
        Self {
            key_fields: source.key_fields.clone(),
            category: source.category.clone(),
            region: source.region.clone(),
        }
    }

    fn extract(&self, entry: &Value) -> Result<CandidateRecord, AdapterError> {
        let mut key = NaturalKey::new();
        for field in &self.key_fields {
            let value = text_field(entry, field)
                .ok_or_else(|| AdapterError::MissingField(field.clone()))?;
            key.insert(field.clone(), value);
        }

        let filed_date = text_field(entry, "filed_date")
            .ok_or_else(|| AdapterError::MissingField("filed_date".to_string()))?;
        let download_url = text_field(entry, "download_url")
            .ok_or_else(|| AdapterError::MissingField("download_url".to_string()))?;

        let classification = Classification {
            category: text_field(entry, "category").unwrap_or_else(|| self.category.clone()),
            region: text_field(entry, "region").unwrap_or_else(|| self.region.clone()),
            sub_category: text_field(entry, "sub_category"),
            year: entry
                .get("year")
                .and_then(|v| v.as_i64().or_else(|| v.as_str()?.trim().parse().ok()))
                .and_then(|y| i32::try_from(y).ok()),
        };

        Ok(CandidateRecord {
            key,
            filed_date,
            download_url,
            classification,
            payload: entry.clone(),
        })
    }
}

/// Reads a string or number field as text; empty strings count as missing
fn text_field(entry: &Value, name: &str) -> Option<String> {
    match entry.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
