use serde::Deserialize;

/// Main configuration structure for Catalog-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetrySection,
    pub download: DownloadConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Crawl range and concurrency
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First catalog page to list
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Last catalog page to list; when absent, listing stops at the first empty page
    #[serde(rename = "end-page", default)]
    pub end_page: Option<u32>,

    /// Number of consumer workers draining the work queue
    pub workers: u32,

    /// Maximum number of records processed at the same time
    #[serde(rename = "max-concurrent-sessions")]
    pub max_concurrent_sessions: u32,

    /// When a record id is claimed relative to its processing
    #[serde(rename = "claim-policy", default)]
    pub claim_policy: ClaimPolicy,
}

/// Claim semantics for record identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ClaimPolicy {
    /// Claim before processing and keep the claim whatever happens
    #[default]
    #[serde(rename = "before-process")]
    BeforeProcess,

    /// Claim before processing, release the claim if processing is exhausted
    #[serde(rename = "on-success")]
    OnSuccess,
}

/// Retry policies for the two flaky operations of a crawl
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Listing record locators on one catalog page
    #[serde(default = "RetryConfig::discovery_default")]
    pub discovery: RetryConfig,

    /// Extracting the attachments of one record
    #[serde(default = "RetryConfig::processing_default")]
    pub processing: RetryConfig,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            discovery: RetryConfig::discovery_default(),
            processing: RetryConfig::processing_default(),
        }
    }
}

/// Bounded attempts with flat random backoff
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Lower bound of the pause between attempts (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the pause between attempts (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Refresh the underlying session after every N failed attempts
    #[serde(rename = "refresh-every", default)]
    pub refresh_every: Option<u32>,
}

impl RetryConfig {
    fn discovery_default() -> Self {
        Self {
            max_attempts: 60,
            min_delay_ms: 2000,
            max_delay_ms: 3000,
            refresh_every: Some(1),
        }
    }

    fn processing_default() -> Self {
        Self {
            max_attempts: 80,
            min_delay_ms: 2000,
            max_delay_ms: 3000,
            refresh_every: Some(1),
        }
    }
}

/// Download-commit pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Whether discovered attachments are downloaded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory receiving `{sequence}_{name}` files
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    #[serde(rename = "max-attempts", default = "default_download_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between download attempts (milliseconds)
    #[serde(rename = "delay-ms", default = "default_download_delay_ms")]
    pub delay_ms: u64,

    #[serde(rename = "max-concurrent-downloads", default = "default_concurrent_downloads")]
    pub max_concurrent_downloads: u32,

    /// Only attachments whose name contains one of these (case-insensitive) are fetched
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Replacement for characters that are illegal in file names
    #[serde(default = "default_placeholder")]
    pub placeholder: char,

    /// Name used when sanitizing leaves nothing
    #[serde(rename = "fallback-name", default = "default_fallback_name")]
    pub fallback_name: String,

    /// Numbering continues after this value (or after the ledger's maximum)
    #[serde(rename = "sequence-start", default)]
    pub sequence_start: u64,

    /// Log what would be downloaded without fetching or numbering anything
    #[serde(default)]
    pub simulate: bool,
}

/// Where and how the catalog is read
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Listing page URL; `{page}` is replaced by the page index
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// CSS selector matching the record links on a listing page
    #[serde(rename = "record-selector")]
    pub record_selector: String,

    /// Present on a fully rendered listing page, even when it has no records
    #[serde(rename = "listing-ready-selector", default)]
    pub listing_ready_selector: Option<String>,

    /// Present on a fully rendered record page
    #[serde(rename = "record-ready-selector", default)]
    pub record_ready_selector: Option<String>,

    /// CSS selector matching attachment links on a record page
    #[serde(rename = "document-selector")]
    pub document_selector: String,

    /// Element inside an attachment link holding its display name
    #[serde(rename = "document-name-selector", default)]
    pub document_name_selector: Option<String>,

    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
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

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Append-only HTML report of every record and its attachments
    #[serde(rename = "report-path")]
    pub report_path: String,

    /// Markdown summary written at the end of each run
    #[serde(rename = "summary-path", default)]
    pub summary_path: Option<String>,
}

/// Optional end-of-run notification
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(rename = "webhook-url", default)]
    pub webhook_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_download_attempts() -> u32 {
    5
}

fn default_download_delay_ms() -> u64 {
    2000
}

fn default_concurrent_downloads() -> u32 {
    5
}

fn default_placeholder() -> char {
    '_'
}

fn default_fallback_name() -> String {
    "file".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
