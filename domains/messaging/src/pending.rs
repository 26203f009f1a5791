//! Holding area for status events whose correlation id is not in the ledger yet.
//!
//! Bounded by capacity and TTL. Events are replayed, oldest gateway time first, when the id
//! shows up through an append or a correlation assignment.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::entities::StatusEvent;

struct Pending {
    event: StatusEvent,
    buffered_at: Instant,
}

pub struct StatusBuffer {
    entries: Mutex<HashMap<String, Vec<Pending>>>,
    ttl: Duration,
    capacity: usize,
}

impl StatusBuffer {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    fn expired(&self, pending: &Pending, now: Instant) -> bool {
        now.duration_since(pending.buffered_at) >= self.ttl
    }

    fn purge(&self, entries: &mut HashMap<String, Vec<Pending>>, now: Instant) {
        entries.retain(|_, events| {
            events.retain(|p| !self.expired(p, now));
            !events.is_empty()
        });
    }

    /// Hold an event. Returns false when the buffer is full.
    pub fn push(&self, event: StatusEvent) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.purge(&mut entries, now);

        let held: usize = entries.values().map(Vec::len).sum();
        if held >= self.capacity {
            return false;
        }
        entries
            .entry(event.correlation_id.clone())
            .or_default()
            .push(Pending {
                event,
                buffered_at: now,
            });
        true
    }

    /// Remove and return the live events for a correlation id, oldest gateway time first
    pub fn take(&self, correlation_id: &str) -> Vec<StatusEvent> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut events: Vec<StatusEvent> = entries
            .remove(correlation_id)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !self.expired(p, now))
            .map(|p| p.event)
            .collect();
        events.sort_by_key(|e| e.event_at);
        events
    }

    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.purge(&mut entries, Instant::now());
        entries.values().map(Vec::len).sum()
    }

    #[mutants::skip] // Delegates to len()
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
