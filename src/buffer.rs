//! Bounded in-memory event history
//!
//! Provides a thread-safe ring buffer that keeps the most recent events in
//! insertion order, evicting the oldest one when full.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::event::LogEvent;

/// Thread-safe ring buffer of recent events
///
/// Every read returns an owned snapshot, so later insertions never change
/// what a caller already holds.
#[derive(Debug)]
pub struct RingBuffer {
    /// Events, oldest at the front (capped at capacity)
    entries: RwLock<VecDeque<Arc<LogEvent>>>,
    /// Maximum events to keep; 0 keeps nothing
    capacity: usize,
}

impl RingBuffer {
    /// Create a new buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evicting the oldest one if the buffer is full
    pub fn add(&self, event: Arc<LogEvent>) {
        if self.capacity == 0 {
            return;
        }

        // A poisoned lock still guards a structurally valid deque
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// All entries, oldest first
    pub fn all(&self) -> Vec<Arc<LogEvent>> {
        self.read(|entries| entries.iter().cloned().collect())
    }

    /// The last `count` entries, oldest of that window first
    pub fn recent(&self, count: usize) -> Vec<Arc<LogEvent>> {
        self.read(|entries| {
            let skip = entries.len().saturating_sub(count);
            entries.iter().skip(skip).cloned().collect()
        })
    }

    /// Entries satisfying `predicate`, in buffer order
    pub fn matching<P>(&self, mut predicate: P) -> Vec<Arc<LogEvent>>
    where
        P: FnMut(&LogEvent) -> bool,
    {
        self.read(|entries| {
            entries
                .iter()
                .filter(|e| predicate(e))
                .cloned()
                .collect()
        })
    }

    /// Get the number of entries in the buffer
    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn read<T>(&self, f: impl FnOnce(&VecDeque<Arc<LogEvent>>) -> T) -> T {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        f(&entries)
    }
}
