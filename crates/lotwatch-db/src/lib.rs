//! `PostgreSQL` event store for Lotwatch.
//!
//! Sensor readings are appended to a single `sensor_events` table and never
//! modified. This crate owns the schema, the connection pool, and the
//! [`EventStore`] adapter that implements [`lotwatch_core::EventSource`] so
//! the occupancy service can read through it.
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`event_store`] -- Batch event insertion, report ingestion, and querying
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::DbError;
pub use event_store::{EventRow, EventStore};
pub use postgres::{PostgresConfig, PostgresPool};
