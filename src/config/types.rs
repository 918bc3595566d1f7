use serde::Deserialize;

/// Main configuration structure for Sumi-Docket
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "proxy")]
    pub proxies: Vec<ProxyEntry>,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by its id
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Crawl cycle behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Root directory under which downloaded artifacts are stored
    #[serde(rename = "artifact-root")]
    pub artifact_root: String,

    /// Upper bound on a single artifact download (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Number of sources whose cycles may run at the same time
    #[serde(rename = "max-concurrent-sources", default = "default_concurrency")]
    pub max_concurrent_sources: u32,

    /// Consecutive transport failures before a proxy endpoint is skipped (0 disables)
    #[serde(rename = "proxy-failure-threshold", default = "default_failure_threshold")]
    pub proxy_failure_threshold: u32,
}

fn default_fetch_timeout() -> u64 {
    120
}

fn default_concurrency() -> u32 {
    4
}

fn default_failure_threshold() -> u32 {
    3
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A single egress proxy
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    pub host: String,
    pub port: u16,
}

/// How a source treats records that were already fully processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Skip silently
    #[default]
    Skip,
    /// Skip, but log and count the duplicate
    Report,
}

/// Per-source crawl configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source identifier, also the CrawlConfig row key
    pub id: String,

    /// chrono format string of the persisted watermark
    #[serde(rename = "date-format", default = "default_date_format")]
    pub date_format: String,

    /// Watermark used to seed the CrawlConfig row on first sight of the source
    #[serde(rename = "seed-watermark")]
    pub seed_watermark: String,

    /// Listing endpoint with `{start}` and `{end}` placeholders
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Result-count endpoint with `{start}` and `{end}` placeholders
    #[serde(rename = "count-url", default)]
    pub count_url: Option<String>,

    /// Source-side cap on results per query; enables range splitting
    #[serde(rename = "result-limit", default)]
    pub result_limit: Option<u64>,

    #[serde(rename = "weekly-chunks", default)]
    pub weekly_chunks: bool,

    #[serde(rename = "retro-lookback", default)]
    pub retro_lookback: bool,

    #[serde(rename = "duplicate-policy", default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Record attributes that together form the natural key
    #[serde(rename = "key-fields", default = "default_key_fields")]
    pub key_fields: Vec<String>,

    /// Default classification when a record carries none
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(rename = "artifact-extension", default = "default_extension")]
    pub artifact_extension: String,
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

fn default_key_fields() -> Vec<String> {
    vec![
        "source_url".to_string(),
        "external_id".to_string(),
        "title".to_string(),
    ]
}

fn default_category() -> String {
    "opinions".to_string()
}

fn default_region() -> String {
    "unknown".to_string()
}

fn default_extension() -> String {
    "pdf".to_string()
}
