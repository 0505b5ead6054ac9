//! Crawler module for catalog discovery and record processing
//!
//! This module contains the core harvesting machinery:
//! - Retrying executor with flat random backoff
//! - Session pool limiting concurrent record processing
//! - Work queue with a drain barrier
//! - The producer/consumer orchestrator tying them together

mod gate;
mod orchestrator;
mod queue;
mod retry;
mod work;

pub use gate::{ResourcePool, SessionPermit};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use queue::{Ticket, WorkQueue};
pub use retry::{RetryOutcome, RetryPolicy};
pub use work::{record_id_from_locator, WorkItem};
