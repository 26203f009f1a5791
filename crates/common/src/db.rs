//! Database error classification shared by repositories

use crate::error::Error;
use thiserror::Error;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Repository-level errors, distinguishing constraint conflicts from connection failures
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Classify a sqlx error, turning unique-constraint violations into `AlreadyExists`
    pub fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                return RepositoryError::AlreadyExists(constraint);
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return RepositoryError::NotFound;
        }
        RepositoryError::Connection(err)
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Error::NotFound("Record not found".to_string()),
            RepositoryError::AlreadyExists(constraint) => {
                Error::Conflict(format!("Record already exists ({})", constraint))
            }
            RepositoryError::Connection(e) => Error::Database(e),
        }
    }
}
