//! Bounded emission history.

use crate::types::EmittedEvent;
use std::collections::VecDeque;

/// Default number of events kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// FIFO buffer of the most recent emissions.
#[derive(Debug, Clone)]
pub struct History {
    events: VecDeque<EmittedEvent>,
    capacity: usize,
}

impl History {
    /// Create an empty buffer holding at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest ones past capacity.
    pub fn record(&mut self, event: EmittedEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Copy of the buffer, oldest first.
    pub fn snapshot(&self) -> Vec<EmittedEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: usize) -> EmittedEvent {
        EmittedEvent::new(format!("test:{n}"), serde_json::json!(n), "test")
    }

    #[test]
    fn test_evicts_oldest() {
        let mut history = History::with_capacity(10);
        for n in 0..15 {
            history.record(event(n));
        }

        let topics: Vec<_> = history.snapshot().into_iter().map(|e| e.topic).collect();
        assert_eq!(history.len(), 10);
        assert_eq!(topics.first().map(String::as_str), Some("test:5"));
        assert_eq!(topics.last().map(String::as_str), Some("test:14"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut history = History::default();
        history.record(event(1));

        let mut copy = history.snapshot();
        copy.clear();
        copy.push(event(2));

        assert_eq!(history.len(), 1);
        assert_eq!(history.snapshot()[0].topic, "test:1");
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = History::with_capacity(0);
        history.record(event(1));
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut history = History::with_capacity(3);
        history.record(event(1));
        history.record(event(2));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }
}
