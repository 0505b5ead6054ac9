//! Catalog-Harvester: a resumable catalog crawler and attachment downloader
//!
//! This crate walks a paginated catalog of remote records, discovers the files
//! attached to each record, and stores every file exactly once, even across
//! repeated runs, flaky pages and network failures.

pub mod config;
pub mod crawler;
pub mod download;
pub mod notify;
pub mod output;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Catalog-Harvester operations
///
/// Everything in here is a setup-level failure. Faults that happen while a
/// single record or file is being handled are expressed as [`Fault`] and never
/// leave the worker that produced them.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Output directory {path} is unusable: {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// A failed attempt inside one unit of work
///
/// Every variant is retried by [`crawler::RetryPolicy`]. Collaborators translate
/// their transport errors into one of these before handing them to the
/// executor, so the executor never sees a `reqwest` or `rusqlite` type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Network trouble, timeouts, unexpected status codes
    #[error("transient fault: {0}")]
    Transient(String),

    /// The operation ran but produced nothing usable
    #[error("empty result: {0}")]
    EmptyResult(String),

    /// A written file is missing or has zero length
    #[error("integrity fault: {0}")]
    Integrity(String),
}

impl Fault {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::EmptyResult(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }
}

impl From<reqwest::Error> for Fault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(format!("request timeout: {}", err))
        } else if err.is_connect() {
            Self::Transient(format!("connection failed: {}", err))
        } else {
            Self::Transient(err.to_string())
        }
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Self::Integrity(err.to_string())
    }
}

/// Result type alias for Catalog-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result of a single attempt: `Ok(None)` means "ran, but found nothing yet"
pub type AttemptResult<T> = std::result::Result<Option<T>, Fault>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, ResourcePool, RetryOutcome, RetryPolicy, WorkItem, WorkQueue};
pub use download::{DownloadOutcome, DownloadPipeline, DownloadResult, SequenceCounter};
pub use storage::{DedupStore, Keyspace, SqliteStorage};
