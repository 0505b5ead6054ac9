//! Output sink trait and run summary types

use crate::source::FoundItem;
use crate::state::StatsSnapshot;
use crate::storage::RunStatus;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to parse report: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives every successfully processed record with its attachments
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Appends one record; appends from concurrent workers must not interleave
    async fn append(&self, source_url: &str, items: &[FoundItem]) -> OutputResult<()>;
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub config_hash: String,
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
}

impl RunSummary {
    /// Percentage of claimed records that were processed successfully
    pub fn success_rate(&self) -> f64 {
        if self.stats.records_claimed == 0 {
            return 0.0;
        }
        (self.stats.records_processed as f64 / self.stats.records_claimed as f64) * 100.0
    }

    /// One-line human summary, used for logs and notifications
    pub fn headline(&self) -> String {
        format!(
            "Run {} {}: {} records processed, {} exhausted, {} files saved, {} duplicates, {} failed in {:.1}s",
            self.run_id,
            self.status.to_db_string(),
            self.stats.records_processed,
            self.stats.records_exhausted,
            self.stats.files_saved,
            self.stats.files_duplicate,
            self.stats.files_failed,
            self.elapsed.as_secs_f64()
        )
    }
}
