//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.
//! One connection is shared behind a mutex; every claim is a single
//! `INSERT OR IGNORE` so the UNIQUE constraint decides who wins a race.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DedupStore, Storage, StorageError, StorageResult};
use crate::storage::{DownloadRecord, Keyspace, RunRecord, RunStatus};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Missing parent directories are created. Any failure here is fatal for
    /// the run: without the store there is no way to know what was already
    /// harvested.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HarvestError::OutputDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        // Another process may hold the write lock briefly
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing and dry runs)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }
}

impl DedupStore for SqliteStorage {
    fn exists(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool> {
        let sql = match keyspace {
            Keyspace::FileHash => "SELECT 1 FROM file_hashes WHERE hash = ?1 LIMIT 1",
            Keyspace::RecordId => "SELECT 1 FROM records WHERE record_id = ?1 LIMIT 1",
        };

        let found: Option<i64> = self
            .conn()?
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;

        Ok(found.is_some())
    }

    fn insert_if_absent(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool> {
        let sql = match keyspace {
            Keyspace::FileHash => {
                "INSERT OR IGNORE INTO file_hashes (hash, created_at) VALUES (?1, ?2)"
            }
            Keyspace::RecordId => {
                "INSERT OR IGNORE INTO records (record_id, created_at) VALUES (?1, ?2)"
            }
        };

        let now = Utc::now().to_rfc3339();
        let inserted = self.conn()?.execute(sql, params![key, now])?;

        Ok(inserted == 1)
    }

    fn release(&self, keyspace: Keyspace, key: &str) -> StorageResult<bool> {
        let sql = match keyspace {
            Keyspace::FileHash => "DELETE FROM file_hashes WHERE hash = ?1",
            Keyspace::RecordId => "DELETE FROM records WHERE record_id = ?1",
        };

        let removed = self.conn()?.execute(sql, params![key])?;
        Ok(removed > 0)
    }

    fn count_keys(&self, keyspace: Keyspace) -> StorageResult<u64> {
        let sql = match keyspace {
            Keyspace::FileHash => "SELECT COUNT(*) FROM file_hashes",
            Keyspace::RecordId => "SELECT COUNT(*) FROM records",
        };

        let count: i64 = self.conn()?.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .optional()?;

        Ok(run)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Download Ledger =====

    fn record_download(&self, record: &DownloadRecord) -> StorageResult<()> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO downloads (sequence, final_path, content_hash, byte_size, source_url, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.sequence as i64,
                record.final_path,
                record.content_hash,
                record.byte_size as i64,
                record.source_url,
                record.saved_at
            ],
        )?;

        if inserted == 0 {
            return Err(StorageError::ConstraintViolation(format!(
                "sequence {} already recorded",
                record.sequence
            )));
        }
        Ok(())
    }

    fn max_sequence(&self) -> StorageResult<Option<u64>> {
        let max: Option<i64> =
            self.conn()?
                .query_row("SELECT MAX(sequence) FROM downloads", [], |row| row.get(0))?;
        Ok(max.map(|m| m as u64))
    }

    fn count_downloads(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM downloads", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
