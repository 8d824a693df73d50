use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

use super::errors::ConfirmerError;

/// One in-flight transaction awaiting confirmation.
#[derive(Debug, Clone)]
pub struct Entry {
    pub tx_hash: String,
    /// Time of the last status check, or the enqueue time if never checked.
    /// Non-decreasing for the life of the entry.
    pub last_checked_at: Instant,
}

impl Entry {
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self { tx_hash: tx_hash.into(), last_checked_at: Instant::now() }
    }

    /// Stamps the entry with the time of the check that just happened.
    pub fn touch(&mut self) {
        self.last_checked_at = Instant::now();
    }
}

/// FIFO of pending entries shared by every worker.
///
/// A plain queue, not a priority queue: correctness only needs each entry to
/// be revisited periodically, and the elapsed-time gate in the confirmer
/// paces the actual chain calls. `dequeue` hands an entry to exactly one
/// caller; it is out of the queue until re-enqueued, so two workers can never
/// poll the same transaction at once.
pub struct RetryQueue {
    entries: Mutex<VecDeque<Entry>>,
    /// Fixed at construction. `0` means unbounded.
    capacity: usize,
}

impl RetryQueue {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), capacity }
    }

    /// Tail insert. Refuses with [`ConfirmerError::QueueFull`] when a bounded
    /// queue is already at capacity.
    pub fn enqueue(&self, entry: Entry) -> Result<(), ConfirmerError> {
        let mut entries = self.entries.lock();
        if self.capacity != 0 && entries.len() >= self.capacity {
            return Err(ConfirmerError::QueueFull);
        }
        entries.push_back(entry);
        Ok(())
    }

    /// Head removal. `None` means nothing to do this tick; never blocks.
    pub fn dequeue(&self) -> Option<Entry> {
        self.entries.lock().pop_front()
    }

    /// Advisory count; may be stale immediately under concurrent mutation.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
