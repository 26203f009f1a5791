//! State machine error shared by domain crates

use thiserror::Error;

use crate::error::Error as AppError;

/// Errors raised when an entity is asked to move to a state it cannot reach
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot transition from {from} to {to} via {event}")]
    InvalidTransition {
        from: String,
        to: String,
        event: String,
    },

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        AppError::Validation(err.to_string())
    }
}
