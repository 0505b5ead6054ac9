//! Counting gate for expensive sessions
//!
//! Processing a record holds a live session against the catalog. The pool
//! caps how many of those exist at once, independent of how many workers are
//! running.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed number of session slots shared by all workers
///
/// Cloning the pool hands out another handle to the same slots.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One occupied slot; dropping it frees the slot
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
}

impl ResourcePool {
    /// Creates a pool with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot
    ///
    /// Returns `None` only if the underlying semaphore was closed. A permit
    /// released on any path, including a panic unwinding through the holder,
    /// goes back to the pool.
    pub async fn acquire(&self) -> Option<SessionPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(SessionPermit { _permit: permit })
    }

    /// Number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
