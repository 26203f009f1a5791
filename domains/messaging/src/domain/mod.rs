//! Domain layer for Messaging

pub mod entities;
pub mod events;
pub mod state;
