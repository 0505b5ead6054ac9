//! Storage module for persisting harvest state
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The two dedup keyspaces (content hashes and record identifiers)
//! - Run tracking
//! - The ledger of committed downloads

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DedupStore, Storage, StorageError, StorageResult};

use crate::HarvestError;
use std::fmt;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// An independent namespace of unique keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// SHA-256 hex digests of stored file contents
    FileHash,

    /// Identifiers of claimed records
    RecordId,
}

impl Keyspace {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FileHash => "file_hash",
            Self::RecordId => "record_id",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "file_hash" => Some(Self::FileHash),
            "record_id" => Some(Self::RecordId),
            _ => None,
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A committed download as stored in the ledger
#[derive(Debug, Clone)]
pub struct DownloadRecord {
    pub sequence: u64,
    pub final_path: String,
    pub content_hash: String,
    pub byte_size: u64,
    pub source_url: String,
    pub saved_at: String,
}
