use std::future::Future;
use tokio::sync::Mutex;

/// The single owner of download sequence numbers
///
/// Numbers are handed out only through [`commit_next`](Self::commit_next),
/// which holds the counter for the whole commit. Two commits therefore never
/// interleave, and a number is consumed even when its commit fails.
#[derive(Debug)]
pub struct SequenceCounter {
    last: Mutex<u64>,
}

impl SequenceCounter {
    /// Creates a counter whose first number will be `last + 1`
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    /// Takes the next number and runs `commit` with it while holding the counter
    pub async fn commit_next<F, Fut, T>(&self, commit: F) -> T
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last.lock().await;
        *last += 1;
        commit(*last).await
    }

    /// Most recently issued number
    pub async fn last(&self) -> u64 {
        *self.last.lock().await
    }
}
