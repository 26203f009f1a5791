//! Shared utilities, configuration, and error handling for Leadline
//!
//! - Configuration loaded from the environment
//! - The application error type and its HTTP mapping
//! - State machine and repository error types
//! - Axum extractors (validated JSON bodies, pagination)

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod state;

pub use config::{Config, StoreProvider, UnknownStatusPolicy};
pub use db::RepositoryError;
pub use error::{Error, Result};
pub use extractors::{CursorPagination, Pagination, ValidatedJson};
pub use state::StateError;
