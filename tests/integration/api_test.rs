//! API endpoint integration tests
//!
//! Drives the full router: webhooks, messages, leads, conversations, analytics, the change
//! feed, and cross-cutting ledger invariants.

#![allow(dead_code)]

mod analytics;
mod common;
mod conversations;
mod events;
mod invariants;
mod leads;
mod messages;
mod webhooks;
