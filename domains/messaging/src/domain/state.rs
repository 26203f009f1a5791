//! State machines for delivery status and conversation lifecycle
//!
//! Delivery: Sent -> Delivered -> Read, Failed from Sent or Delivered. Read and Failed are
//! terminal; Received (inbound) accepts nothing.
//! Conversation: Active <-> Archived.

use chrono::{DateTime, Utc};
pub use leadline_common::StateError;
use serde::{Deserialize, Serialize};

use super::entities::{ConversationStatus, DeliveryStatus};

impl DeliveryStatus {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [DeliveryStatus] {
        match self {
            Self::Received => &[],
            Self::Sent => &[Self::Delivered, Self::Read, Self::Failed],
            Self::Delivered => &[Self::Read, Self::Failed],
            Self::Read | Self::Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Read | Self::Failed)
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// What a status event does to a message, before anything is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// Write the new status
    Apply,
    /// Same status already recorded
    Duplicate,
    /// Event is older than the recorded status
    Stale,
    /// Not a forward move from the recorded status
    Regressed,
}

/// Result of applying a status event, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOutcome {
    Applied,
    Duplicate,
    Stale,
    Regressed,
    /// Correlation id unknown; held for replay
    Buffered,
}

impl From<StatusDecision> for StatusOutcome {
    fn from(decision: StatusDecision) -> Self {
        match decision {
            StatusDecision::Apply => StatusOutcome::Applied,
            StatusDecision::Duplicate => StatusOutcome::Duplicate,
            StatusDecision::Stale => StatusOutcome::Stale,
            StatusDecision::Regressed => StatusOutcome::Regressed,
        }
    }
}

impl std::fmt::Display for StatusOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Stale => write!(f, "stale"),
            Self::Regressed => write!(f, "regressed"),
            Self::Buffered => write!(f, "buffered"),
        }
    }
}

/// Delivery status state machine
pub struct DeliveryStateMachine;

impl DeliveryStateMachine {
    /// Decide what a status event does. Every store calls this under its row lock.
    ///
    /// `current_at` is the gateway time of the recorded status, `None` until the gateway has
    /// reported one. Server clocks never bound staleness.
    pub fn evaluate(
        current: DeliveryStatus,
        current_at: Option<DateTime<Utc>>,
        next: DeliveryStatus,
        event_at: DateTime<Utc>,
    ) -> StatusDecision {
        if current_at.is_some_and(|at| event_at < at) {
            return StatusDecision::Stale;
        }
        if next == current {
            return StatusDecision::Duplicate;
        }
        if !current.can_transition_to(next) {
            return StatusDecision::Regressed;
        }
        StatusDecision::Apply
    }

    /// Attempt a transition outside the callback path (local send failures)
    pub fn transition(
        current: DeliveryStatus,
        next: DeliveryStatus,
    ) -> Result<DeliveryStatus, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }
        if !current.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
                event: format!("status:{}", next),
            });
        }
        Ok(next)
    }
}

/// Events that trigger conversation state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationEvent {
    Archive,
    Unarchive,
}

impl std::fmt::Display for ConversationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Unarchive => write!(f, "unarchive"),
        }
    }
}

impl ConversationStatus {
    pub fn valid_transitions(&self) -> &'static [ConversationStatus] {
        match self {
            Self::Active => &[Self::Archived],
            Self::Archived => &[Self::Active],
        }
    }
}

/// Conversation state machine
pub struct ConversationStateMachine;

impl ConversationStateMachine {
    pub fn transition(
        current: ConversationStatus,
        event: ConversationEvent,
    ) -> Result<ConversationStatus, StateError> {
        match (current, event) {
            (ConversationStatus::Active, ConversationEvent::Archive) => {
                Ok(ConversationStatus::Archived)
            }
            (ConversationStatus::Archived, ConversationEvent::Unarchive) => {
                Ok(ConversationStatus::Active)
            }
            _ => Err(StateError::InvalidTransition {
                from: current.to_string(),
                to: "unknown".to_string(),
                event: event.to_string(),
            }),
        }
    }
}
