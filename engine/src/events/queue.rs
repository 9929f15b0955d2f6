//! Bounded FIFO event queue
//!
//! Capacity-bounded, drop-oldest on overflow. After a successful sync the
//! queue keeps `{unsynced} + {last K synced}` — the synced tail is the
//! dedup window against a remote sink replaying acknowledgements.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use super::AnalyticsEvent;

/// Bounded in-order event buffer, serialized as one blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueue {
    capacity: usize,
    events: VecDeque<AnalyticsEvent>,
}

impl EventQueue {
    /// Create an empty queue holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
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

    /// Append an event, dropping the oldest entry when full.
    ///
    /// Returns the dropped event, if any.
    pub fn push(&mut self, event: AnalyticsEvent) -> Option<AnalyticsEvent> {
        let dropped = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        dropped
    }

    /// Oldest-first view of events not yet acknowledged by the sink,
    /// limited to `max` entries.
    pub fn unsynced(&self, max: usize) -> Vec<AnalyticsEvent> {
        self.events
            .iter()
            .filter(|e| !e.synced)
            .take(max)
            .cloned()
            .collect()
    }

    /// Count of events awaiting sync.
    pub fn unsynced_len(&self) -> usize {
        self.events.iter().filter(|e| !e.synced).count()
    }

    /// Mark the given event ids as acknowledged. Unknown ids are ignored.
    pub fn mark_synced(&mut self, ids: &[String]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut marked = 0;
        for event in &mut self.events {
            if !event.synced && ids.contains(event.id.as_str()) {
                event.synced = true;
                marked += 1;
            }
        }
        marked
    }

    /// Trim to `{unsynced} + {last keep_synced synced}`, preserving order.
    pub fn trim(&mut self, keep_synced: usize) {
        let synced_total = self.events.iter().filter(|e| e.synced).count();
        if synced_total <= keep_synced {
            return;
        }
        let mut to_drop = synced_total - keep_synced;
        self.events.retain(|e| {
            if e.synced && to_drop > 0 {
                to_drop -= 1;
                false
            } else {
                true
            }
        });
    }

    /// Iterate events oldest-first (tests and diagnostics).
    pub fn iter(&self) -> impl Iterator<Item = &AnalyticsEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use chrono::Utc;

    fn event(tag: &str) -> AnalyticsEvent {
        let mut e = AnalyticsEvent::new(EventKind::Shown, Utc::now());
        e.id = tag.to_string();
        e
    }

    #[test]
    fn test_queue_bound_drops_oldest() {
        let mut queue = EventQueue::new(10);
        for i in 0..15 {
            queue.push(event(&format!("e{}", i)));
        }
        assert_eq!(queue.len(), 10);
        // The 5 oldest (e0..e4) were dropped.
        let ids: Vec<&str> = queue.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"e5"));
        assert_eq!(ids.last(), Some(&"e14"));
    }

    #[test]
    fn test_push_reports_dropped() {
        let mut queue = EventQueue::new(2);
        assert!(queue.push(event("a")).is_none());
        assert!(queue.push(event("b")).is_none());
        let dropped = queue.push(event("c")).unwrap();
        assert_eq!(dropped.id, "a");
    }

    #[test]
    fn test_unsynced_batch_is_bounded_and_ordered() {
        let mut queue = EventQueue::new(10);
        for i in 0..6 {
            queue.push(event(&format!("e{}", i)));
        }
        queue.mark_synced(&["e0".to_string(), "e1".to_string()]);

        let batch = queue.unsynced(3);
        let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_mark_synced_ignores_unknown_ids() {
        let mut queue = EventQueue::new(10);
        queue.push(event("a"));
        let marked = queue.mark_synced(&["a".to_string(), "ghost".to_string()]);
        assert_eq!(marked, 1);
        assert_eq!(queue.unsynced_len(), 0);
    }

    #[test]
    fn test_trim_keeps_unsynced_plus_tail() {
        let mut queue = EventQueue::new(20);
        for i in 0..8 {
            queue.push(event(&format!("e{}", i)));
        }
        // e0..e5 synced, e6/e7 pending.
        let acked: Vec<String> = (0..6).map(|i| format!("e{}", i)).collect();
        queue.mark_synced(&acked);

        queue.trim(2);

        let ids: Vec<&str> = queue.iter().map(|e| e.id.as_str()).collect();
        // Oldest synced entries trimmed; last 2 synced kept for dedup.
        assert_eq!(ids, vec!["e4", "e5", "e6", "e7"]);
    }

    #[test]
    fn test_trim_noop_when_under_tail() {
        let mut queue = EventQueue::new(20);
        queue.push(event("a"));
        queue.mark_synced(&["a".to_string()]);
        queue.trim(5);
        assert_eq!(queue.len(), 1);
    }
}
