//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `PagePhase` / `RunPhase`: validated lifecycles of a listing page and of a run
//! - `RunStats`: counters shared by every task of a run

mod phase;
mod stats;

// Re-export main types
pub use phase::{PagePhase, RunPhase};
pub use stats::{HarvestEvent, RunStats, StatsSnapshot};
