//! Error types for the `PostgreSQL` adapter.
//!
//! All errors are propagated via [`DbError`]. At the query-service boundary
//! they become [`SourceError::Backend`] so callers see a single retryable
//! "store unavailable" failure regardless of the cause.

use lotwatch_core::SourceError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row or an event to insert violates the domain types.
    #[error("invalid sensor event row: {0}")]
    InvalidRow(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for SourceError {
    fn from(err: DbError) -> Self {
        Self::backend(err)
    }
}
