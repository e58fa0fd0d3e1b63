//! Bounded, ordered transcript storage.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use super::LogEntry;

/// Entries kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 200;

/// Queue depth for live subscribers before they start lagging.
const SUBSCRIBER_BUFFER: usize = 1024;

/// Ring buffer of the most recent [`LogEntry`] values.
///
/// Appends beyond capacity evict the oldest entry. Every append is also
/// broadcast to live subscribers in the same order.
#[derive(Debug)]
pub struct LogSink {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
    live: broadcast::Sender<LogEntry>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogSink {
    /// Create a sink holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            live,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn append(&self, entry: LogEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        // Send under the lock so subscribers observe append order.
        let _ = self.live.send(entry);
    }

    /// Current entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Receive entries appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of stored entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all stored entries.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
