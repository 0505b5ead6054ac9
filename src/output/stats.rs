//! Statistics read back from the harvest database
//!
//! Backs the `--stats` command and the totals section of the run summary.

use crate::storage::{Keyspace, RunRecord, Storage};
use crate::HarvestError;

/// Totals across every run recorded in a store
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Record ids ever claimed
    pub record_ids: u64,

    /// Distinct contents ever committed
    pub file_hashes: u64,

    /// Rows in the download ledger
    pub downloads: u64,

    /// Highest sequence number in the ledger
    pub last_sequence: Option<u64>,

    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics, HarvestError> {
    Ok(StoreStatistics {
        record_ids: storage.count_keys(Keyspace::RecordId)?,
        file_hashes: storage.count_keys(Keyspace::FileHash)?,
        downloads: storage.count_downloads()?,
        last_sequence: storage.max_sequence()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Dedup store:");
    println!("  {}: {}", Keyspace::RecordId, stats.record_ids);
    println!("  {}: {}", Keyspace::FileHash, stats.file_hashes);
    println!();

    println!("Downloads:");
    println!("  Committed files: {}", stats.downloads);
    match stats.last_sequence {
        Some(n) => println!("  Last sequence number: {}", n),
        None => println!("  Last sequence number: (none)"),
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
        }
        None => println!("No runs recorded yet"),
    }
}
