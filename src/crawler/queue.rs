//! Unbounded FIFO work queue with completion tracking
//!
//! Workers take items with [`WorkQueue::pop`] and receive a [`Ticket`]. An item
//! counts as pending from the moment it is pushed until its ticket is dropped,
//! so [`WorkQueue::wait_drained`] only returns once every item has actually
//! been handled, not merely dequeued.

use std::ops::Deref;
use tokio::sync::{mpsc, watch, Mutex};

/// Multi-producer, multi-consumer queue of work items
pub struct WorkQueue<T> {
    sender: mpsc::UnboundedSender<T>,
    receiver: Mutex<mpsc::UnboundedReceiver<T>>,
    pending: watch::Sender<usize>,
}

/// A dequeued item; dropping it marks the item as done
pub struct Ticket<'a, T> {
    item: T,
    queue: &'a WorkQueue<T>,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending,
        }
    }

    /// Adds an item; never blocks
    pub fn push(&self, item: T) {
        self.pending.send_modify(|n| *n += 1);
        if self.sender.send(item).is_err() {
            // Receiver lives in `self`, so this only happens during teardown
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }

    /// Waits for the next item
    ///
    /// Items come out in the order they were pushed. Callers that need to stop
    /// waiting should race this against a cancellation signal.
    pub async fn pop(&self) -> Option<Ticket<'_, T>> {
        let item = self.receiver.lock().await.recv().await?;
        Some(Ticket { item, queue: self })
    }

    /// Items pushed but not yet finished
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once every pushed item has been finished
    pub async fn wait_drained(&self) {
        let mut rx = self.pending.subscribe();
        // The sender is owned by `self`, so the channel cannot close here
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn finish(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Ticket<'_, T> {
    pub fn item(&self) -> &T {
        &self.item
    }
}

impl<T> Deref for Ticket<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> Drop for Ticket<'_, T> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let ticket = queue.pop().await.unwrap();
            seen.push(*ticket.item());
        }

        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pending_counts_until_ticket_dropped() {
        let queue = WorkQueue::new();
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.pending(), 2);

        let ticket = queue.pop().await.unwrap();
        assert_eq!(queue.pending(), 2);
        drop(ticket);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_wait_drained_on_empty_queue_returns() {
        let queue: WorkQueue<u32> = WorkQueue::new();
        tokio::time::timeout(Duration::from_secs(1), queue.wait_drained())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_drained_waits_for_consumers() {
        let queue = Arc::new(WorkQueue::new());
        for i in 0..50 {
            queue.push(i);
        }

        let mut workers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            workers.push(tokio::spawn(async move {
                let mut handled = 0;
                while queue.pending() > 0 {
                    let popped = tokio::time::timeout(Duration::from_millis(50), queue.pop()).await;
                    match popped {
                        Ok(Some(_ticket)) => {
                            tokio::task::yield_now().await;
                            handled += 1;
                        }
                        _ => break,
                    }
                }
                handled
            }));
        }

        tokio::time::timeout(Duration::from_secs(5), queue.wait_drained())
            .await
            .unwrap();
        assert_eq!(queue.pending(), 0);

        let mut total = 0;
        for worker in workers {
            total += worker.await.unwrap();
        }
        assert_eq!(total, 50);
    }
}
