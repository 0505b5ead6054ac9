//! Counters shared by the producer, the workers and the download pipeline

use crate::download::DownloadOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Something worth counting that happened during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestEvent {
    PageListed,
    PageExhausted,
    RecordDiscovered,
    /// Already in the store from an earlier run
    RecordKnown,
    RecordEnqueued,
    RecordClaimed,
    /// Lost the claim to another worker or an earlier run
    RecordAlreadyClaimed,
    RecordProcessed,
    RecordExhausted,
    ClaimReleased,
    FileSaved,
    FileDuplicate,
    FileFailed,
    FileSimulated,
    /// Skipped by the keyword filter
    FileFiltered,
}

/// Lock-free run counters
#[derive(Debug, Default)]
pub struct RunStats {
    pages_listed: AtomicU64,
    pages_exhausted: AtomicU64,
    records_discovered: AtomicU64,
    records_known: AtomicU64,
    records_enqueued: AtomicU64,
    records_claimed: AtomicU64,
    records_already_claimed: AtomicU64,
    records_processed: AtomicU64,
    records_exhausted: AtomicU64,
    claims_released: AtomicU64,
    files_saved: AtomicU64,
    files_duplicate: AtomicU64,
    files_failed: AtomicU64,
    files_simulated: AtomicU64,
    files_filtered: AtomicU64,
}

/// Point-in-time copy of [`RunStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub pages_listed: u64,
    pub pages_exhausted: u64,
    pub records_discovered: u64,
    pub records_known: u64,
    pub records_enqueued: u64,
    pub records_claimed: u64,
    pub records_already_claimed: u64,
    pub records_processed: u64,
    pub records_exhausted: u64,
    pub claims_released: u64,
    pub files_saved: u64,
    pub files_duplicate: u64,
    pub files_failed: u64,
    pub files_simulated: u64,
    pub files_filtered: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: HarvestEvent) {
        let counter = match event {
            HarvestEvent::PageListed => &self.pages_listed,
            HarvestEvent::PageExhausted => &self.pages_exhausted,
            HarvestEvent::RecordDiscovered => &self.records_discovered,
            HarvestEvent::RecordKnown => &self.records_known,
            HarvestEvent::RecordEnqueued => &self.records_enqueued,
            HarvestEvent::RecordClaimed => &self.records_claimed,
            HarvestEvent::RecordAlreadyClaimed => &self.records_already_claimed,
            HarvestEvent::RecordProcessed => &self.records_processed,
            HarvestEvent::RecordExhausted => &self.records_exhausted,
            HarvestEvent::ClaimReleased => &self.claims_released,
            HarvestEvent::FileSaved => &self.files_saved,
            HarvestEvent::FileDuplicate => &self.files_duplicate,
            HarvestEvent::FileFailed => &self.files_failed,
            HarvestEvent::FileSimulated => &self.files_simulated,
            HarvestEvent::FileFiltered => &self.files_filtered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts the outcome of one download
    pub fn record_download(&self, outcome: &DownloadOutcome) {
        self.record(match outcome {
            DownloadOutcome::Saved(_) => HarvestEvent::FileSaved,
            DownloadOutcome::SkippedDuplicate { .. } => HarvestEvent::FileDuplicate,
            DownloadOutcome::Simulated { .. } => HarvestEvent::FileSimulated,
            DownloadOutcome::Failed { .. } => HarvestEvent::FileFailed,
        });
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            pages_listed: load(&self.pages_listed),
            pages_exhausted: load(&self.pages_exhausted),
            records_discovered: load(&self.records_discovered),
            records_known: load(&self.records_known),
            records_enqueued: load(&self.records_enqueued),
            records_claimed: load(&self.records_claimed),
            records_already_claimed: load(&self.records_already_claimed),
            records_processed: load(&self.records_processed),
            records_exhausted: load(&self.records_exhausted),
            claims_released: load(&self.claims_released),
            files_saved: load(&self.files_saved),
            files_duplicate: load(&self.files_duplicate),
            files_failed: load(&self.files_failed),
            files_simulated: load(&self.files_simulated),
            files_filtered: load(&self.files_filtered),
        }
    }
}

impl StatsSnapshot {
    /// Files the pipeline handled, whatever the outcome
    pub fn files_total(&self) -> u64 {
        self.files_saved + self.files_duplicate + self.files_failed + self.files_simulated
    }
}
