//! Download-commit pipeline
//!
//! # Commit Flow
//!
//! 1. Take a slot from the download pool
//! 2. Fetch the blob under the download retry policy into a staging file
//!    named `.incoming-<pid>-<n>.part` inside the output directory
//! 3. Verify the staging file is present and non-empty, hash it
//! 4. Claim the hash in the store; a lost claim means duplicate content
//! 5. Under the sequence counter: number the file and rename it into place
//!
//! Files only ever appear under their final `{sequence}_{name}` name fully
//! written. Staging files of failed attempts are removed.

use crate::config::DownloadConfig;
use crate::crawler::{ResourcePool, RetryPolicy, RetryOutcome};
use crate::download::naming::{final_name, matches_keywords, parse_sequence_prefix, sanitize_name};
use crate::download::verify::verify_staged;
use crate::download::SequenceCounter;
use crate::source::{BlobFetcher, FoundItem};
use crate::state::{HarvestEvent, RunStats};
use crate::storage::{DownloadRecord, Keyspace, Storage};
use crate::{AttemptResult, Fault, HarvestError};
use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// A file that was committed under its final name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub sequence_number: u64,
    pub final_path: PathBuf,
    pub content_hash: String,
    pub byte_size: u64,
}

/// What happened to one requested download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(DownloadResult),

    /// Identical content was stored before; nothing was written
    SkippedDuplicate { content_hash: String },

    /// Simulate mode: nothing fetched, no number consumed
    Simulated { final_name: String },

    /// Every attempt failed, or the commit itself failed
    Failed { attempts: u32 },
}

/// Settings for the pipeline, usually built from `[download]`
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    pub policy: RetryPolicy,
    pub max_concurrent: usize,
    pub keywords: Vec<String>,
    pub placeholder: char,
    pub fallback_name: String,
    pub sequence_start: u64,
    pub simulate: bool,
}

impl DownloadSettings {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            policy: RetryPolicy::fixed(config.max_attempts, Duration::from_millis(config.delay_ms)),
            max_concurrent: config.max_concurrent_downloads as usize,
            keywords: config.keywords.clone(),
            placeholder: config.placeholder,
            fallback_name: config.fallback_name.clone(),
            sequence_start: config.sequence_start,
            simulate: config.simulate,
        }
    }
}

/// A verified staging file waiting to be committed
#[derive(Debug)]
struct Staged {
    path: PathBuf,
    content_hash: String,
    byte_size: u64,
}

pub struct DownloadPipeline {
    settings: DownloadSettings,
    store: Arc<dyn Storage>,
    fetcher: Arc<dyn BlobFetcher>,
    counter: SequenceCounter,
    pool: ResourcePool,
    staging_seq: AtomicU64,
}

impl DownloadPipeline {
    /// Prepares the output directory and seeds the sequence counter
    ///
    /// Numbering continues after the highest of `sequence_start`, the
    /// download ledger and any `{n}_` file already in the output directory.
    pub async fn new(
        settings: DownloadSettings,
        store: Arc<dyn Storage>,
        fetcher: Arc<dyn BlobFetcher>,
    ) -> Result<Self, HarvestError> {
        let output_dir = settings.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| HarvestError::OutputDir {
                path: output_dir.display().to_string(),
                source,
            })?;

        let from_ledger = store.max_sequence()?.unwrap_or(0);
        let from_dir = highest_sequence_in(&output_dir).await?;
        let last = settings.sequence_start.max(from_ledger).max(from_dir);

        tracing::info!(
            "Download directory {} ready, numbering continues after {}",
            output_dir.display(),
            last
        );

        Ok(Self {
            pool: ResourcePool::new(settings.max_concurrent),
            settings,
            store,
            fetcher,
            counter: SequenceCounter::starting_after(last),
            staging_seq: AtomicU64::new(0),
        })
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    /// Last sequence number handed out
    pub async fn last_sequence(&self) -> u64 {
        self.counter.last().await
    }

    /// Returns true if an attachment with this display name should be fetched
    pub fn wants(&self, name: &str) -> bool {
        matches_keywords(name, &self.settings.keywords)
    }

    /// Downloads every wanted item concurrently and counts the outcomes
    pub async fn download_all(&self, items: &[FoundItem], stats: &RunStats) -> Vec<DownloadOutcome> {
        let wanted: Vec<&FoundItem> = items
            .iter()
            .filter(|item| {
                let wanted = self.wants(&item.name);
                if !wanted {
                    tracing::debug!("Skipping {} (no keyword match)", item.name);
                    stats.record(HarvestEvent::FileFiltered);
                }
                wanted
            })
            .collect();

        let outcomes = join_all(
            wanted
                .iter()
                .map(|item| self.download(&item.name, &item.href)),
        )
        .await;

        for outcome in &outcomes {
            stats.record_download(outcome);
        }
        outcomes
    }

    /// Fetches, verifies, deduplicates and commits one attachment
    pub async fn download(&self, display_name: &str, remote: &str) -> DownloadOutcome {
        let sanitized = sanitize_name(
            display_name,
            self.settings.placeholder,
            &self.settings.fallback_name,
        );

        if self.settings.simulate {
            tracing::info!("[simulate] would download {} as N_{}", remote, sanitized);
            return DownloadOutcome::Simulated {
                final_name: sanitized,
            };
        }

        let Some(_permit) = self.pool.acquire().await else {
            tracing::warn!("Download pool closed, skipping {}", remote);
            return DownloadOutcome::Failed { attempts: 0 };
        };

        let label = format!("download {}", remote);
        let staged = match self.settings.policy.run(&label, |_| self.stage(remote)).await {
            RetryOutcome::Success { value, .. } => value,
            RetryOutcome::Exhausted { attempts } => {
                tracing::warn!("Giving up on {} after {} attempts", remote, attempts);
                return DownloadOutcome::Failed { attempts };
            }
        };

        self.commit(staged, &sanitized, remote).await
    }

    /// One attempt: fetch into a fresh staging file and verify it
    async fn stage(&self, remote: &str) -> AttemptResult<Staged> {
        let bytes = self.fetcher.fetch(remote).await?;
        if bytes.is_empty() {
            return Err(Fault::empty(format!("empty body from {}", remote)));
        }

        let path = self.staging_path();
        match write_staged(&path, &bytes).await {
            Ok((content_hash, byte_size)) => Ok(Some(Staged {
                path,
                content_hash,
                byte_size,
            })),
            Err(fault) => {
                discard(&path).await;
                Err(fault)
            }
        }
    }

    async fn commit(&self, staged: Staged, sanitized: &str, remote: &str) -> DownloadOutcome {
        match self.store.insert_if_absent(Keyspace::FileHash, &staged.content_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Duplicate content from {}, not saved", remote);
                discard(&staged.path).await;
                return DownloadOutcome::SkippedDuplicate {
                    content_hash: staged.content_hash,
                };
            }
            Err(e) => {
                tracing::warn!("Could not claim content hash for {}: {}", remote, e);
                discard(&staged.path).await;
                return DownloadOutcome::Failed { attempts: 1 };
            }
        }

        let output_dir = &self.settings.output_dir;
        let staged_path = staged.path.as_path();
        let renamed = self
            .counter
            .commit_next(|sequence| async move {
                let final_path = output_dir.join(final_name(sequence, sanitized));
                if tokio::fs::metadata(&final_path).await.is_ok() {
                    return Err((
                        sequence,
                        format!("{} already exists", final_path.display()),
                    ));
                }
                match tokio::fs::rename(staged_path, &final_path).await {
                    Ok(()) => Ok((sequence, final_path)),
                    Err(e) => Err((sequence, e.to_string())),
                }
            })
            .await;

        let (sequence_number, final_path) = match renamed {
            Ok(committed) => committed,
            Err((sequence, reason)) => {
                tracing::warn!(
                    "Commit of {} as number {} failed: {}",
                    remote,
                    sequence,
                    reason
                );
                discard(&staged.path).await;
                if let Err(e) = self.store.release(Keyspace::FileHash, &staged.content_hash) {
                    tracing::warn!("Could not release content hash for {}: {}", remote, e);
                }
                return DownloadOutcome::Failed { attempts: 1 };
            }
        };

        let result = DownloadResult {
            sequence_number,
            final_path,
            content_hash: staged.content_hash,
            byte_size: staged.byte_size,
        };

        let record = DownloadRecord {
            sequence: result.sequence_number,
            final_path: result.final_path.display().to_string(),
            content_hash: result.content_hash.clone(),
            byte_size: result.byte_size,
            source_url: remote.to_string(),
            saved_at: Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.store.record_download(&record) {
            tracing::warn!("Saved {} but could not record it: {}", record.final_path, e);
        }

        tracing::info!(
            "Saved {} ({} bytes)",
            result.final_path.display(),
            result.byte_size
        );
        DownloadOutcome::Saved(result)
    }

    fn staging_path(&self) -> PathBuf {
        let n = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        self.settings
            .output_dir
            .join(format!(".incoming-{}-{}.part", std::process::id(), n))
    }
}

/// Writes and flushes a staging file, then checks what actually landed on disk
async fn write_staged(path: &Path, bytes: &[u8]) -> Result<(String, u64), Fault> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    verify_staged(path).await
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove staging file {}: {}", path.display(), e);
        }
    }
}

/// Highest `{n}_` prefix among the files in `dir`
async fn highest_sequence_in(dir: &Path) -> Result<u64, HarvestError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| HarvestError::OutputDir {
            path: dir.display().to_string(),
            source,
        })?;

    let mut highest = 0;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(n) = entry.file_name().to_str().and_then(parse_sequence_prefix) {
            highest = highest.max(n);
        }
    }
    Ok(highest)
}
