//! Bounded coordination event history
//!
//! The hub keeps the most recent events in memory so late-joining
//! observers can bootstrap. Delivery to live observers is best-effort;
//! this ring is the only replay mechanism.

use std::collections::VecDeque;

use switchboard_core::{CoordinationEvent, EventKind};

/// Default number of events retained for replay.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_000;

/// Fixed-capacity ring of coordination events in insertion order.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<CoordinationEvent>,
    capacity: usize,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
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

    /// Append an event, evicting the oldest when full.
    pub fn append(&mut self, event: CoordinationEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// The most recent `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<CoordinationEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// The most recent `n` events of one kind, oldest first.
    pub fn by_type(&self, kind: EventKind, n: usize) -> Vec<CoordinationEvent> {
        let mut matched: Vec<CoordinationEvent> = self
            .events
            .iter()
            .rev()
            .filter(|e| e.kind == kind)
            .take(n)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Iterate the whole retained history, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &CoordinationEvent> {
        self.events.iter()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(kind: EventKind, seq: usize) -> CoordinationEvent {
        CoordinationEvent::new(kind, Utc::now()).with_payload(json!({ "seq": seq }))
    }

    fn seq_of(e: &CoordinationEvent) -> u64 {
        e.payload.get("seq").and_then(|v| v.as_u64()).unwrap()
    }

    #[test]
    fn recent_returns_tail_in_order() {
        let mut log = EventLog::new(10);
        for i in 0..5 {
            log.append(event(EventKind::TaskCreated, i));
        }
        let tail = log.recent(3);
        assert_eq!(tail.iter().map(seq_of).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn recent_larger_than_len_returns_everything() {
        let mut log = EventLog::new(10);
        log.append(event(EventKind::TaskCreated, 0));
        assert_eq!(log.recent(100).len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.append(event(EventKind::TaskCreated, i));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.recent(3).iter().map(seq_of).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn by_type_filters_and_preserves_order() {
        let mut log = EventLog::new(10);
        log.append(event(EventKind::TaskCreated, 0));
        log.append(event(EventKind::AgentJoined, 1));
        log.append(event(EventKind::TaskCreated, 2));
        log.append(event(EventKind::AgentJoined, 3));

        let joined = log.by_type(EventKind::AgentJoined, 10);
        assert_eq!(joined.iter().map(seq_of).collect::<Vec<_>>(), vec![1, 3]);

        let last_one = log.by_type(EventKind::AgentJoined, 1);
        assert_eq!(last_one.iter().map(seq_of).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let log = EventLog::new(0);
        assert_eq!(log.capacity(), 1);
    }
}
