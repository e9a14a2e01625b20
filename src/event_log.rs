/// Bounded, insertion-ordered log of processed readings
use std::collections::VecDeque;

use crate::models::LogEntry;

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    /// A zero capacity is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        EventLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest ones beyond capacity
    pub fn append(&mut self, entry: LogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Owned copy of the log, oldest first
    ///
    /// The copy never changes under the caller, even while the
    /// pipeline keeps appending.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
