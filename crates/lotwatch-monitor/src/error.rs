//! Error types for the monitor binary.
//!
//! [`MonitorError`] wraps every failure that stops the monitor. Store
//! failures during a poll are not in here: they are logged and the next
//! poll retries.

/// Top-level error for the monitor binary.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lotwatch_core::ConfigError,
    },

    /// Connecting to or migrating the event store failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: lotwatch_db::DbError,
    },

    /// A configured lot or plate identifier is blank.
    #[error("invalid identifier in config: {source}")]
    InvalidId {
        /// The underlying identifier error.
        #[from]
        source: lotwatch_types::IdError,
    },

    /// A startup query failed.
    #[error("query error: {source}")]
    Query {
        /// The underlying query error.
        #[from]
        source: lotwatch_core::QueryError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
