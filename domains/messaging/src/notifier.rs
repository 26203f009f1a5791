//! Broadcast-based change notifier.
//!
//! `publish` never awaits: a subscriber that falls behind the channel capacity is told how
//! many events it missed (`Lagged`) instead of slowing the publisher down.

use std::collections::HashSet;

use tokio::sync::broadcast;

use crate::domain::events::{ChangeEvent, EventKind};

/// Default broadcast channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Fan an event out to every subscriber. Returns how many receivers got it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let kind = event.kind;
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::trace!(kind = %kind, receivers = delivered, "Change event published");
        delivered
    }

    /// Subscribe to events of the given kinds; an empty filter means all kinds.
    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            kinds: kinds.iter().copied().collect(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber gets from `Subscription::next`
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Event(ChangeEvent),
    /// The subscriber fell behind and `n` events were dropped; re-fetch state
    Lagged(u64),
    /// The notifier is gone
    Closed,
}

/// A filtered receiver
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    kinds: HashSet<EventKind>,
}

impl Subscription {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Wait for the next event matching the filter
    pub async fn next(&mut self) -> Received {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(event.kind) => return Received::Event(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => return Received::Lagged(n),
                Err(broadcast::error::RecvError::Closed) => return Received::Closed,
            }
        }
    }
}
