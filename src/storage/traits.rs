//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{DownloadRecord, Keyspace, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key-existence store with atomic insert-if-absent
///
/// Each [`Keyspace`] is an independent namespace. The store is the only
/// authority on whether a record or a file has already been handled, so
/// callers must never emulate `insert_if_absent` with `exists` followed by an
/// insert: two workers racing on the same key would both win.
pub trait DedupStore: Send + Sync {
    /// Returns true if `key` is present in `keyspace`
    fn exists(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool>;

    /// Inserts `key` unless it is already present
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - This call performed the insert
    /// * `Ok(false)` - The key was already present (not an error)
    fn insert_if_absent(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool>;

    /// Removes `key` from `keyspace`, returning true if it was present
    ///
    /// Only the claim-on-success policy uses this, to hand a record that
    /// exhausted its retries back to a future run.
    fn release(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool>;

    /// Counts the keys stored in `keyspace`
    fn count_keys(&self, keyspace: Keyspace) -> StorageResult<u64>;
}

/// Full storage backend: the dedup keyspaces plus the run and download ledgers
pub trait Storage: DedupStore {
    // ===== Run Management =====

    /// Creates a new harvest run and returns its ID
    fn create_run(&self, config_hash: &str) -> StorageResult<i64>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given terminal status
    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Download Ledger =====

    /// Records a committed download
    fn record_download(&self, record: &DownloadRecord) -> StorageResult<()>;

    /// Highest sequence number ever committed, if any
    fn max_sequence(&self) -> StorageResult<Option<u64>>;

    /// Number of committed downloads
    fn count_downloads(&self) -> StorageResult<u64>;
}
