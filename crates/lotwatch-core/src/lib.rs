//! Event reduction and occupancy queries for the Lotwatch parking core.
//!
//! Sensor events arrive as an append-only log with one row per reading.
//! This crate turns that log into the answers the dashboard polls for:
//! which spots in a lot are taken, whether a plate is parked, and for how
//! long.
//!
//! ```text
//! caller --> OccupancyService --> EventSource (deadline-bounded fetch)
//!                  |
//!                  +--> reducer (latest event per spot / plate)
//!                  +--> TimestampCorrection (civil time -> UTC)
//! ```
//!
//! # Modules
//!
//! - [`reducer`] -- Pure folds from events to latest state per key
//! - [`service`] -- [`OccupancyService`] query operations
//! - [`source`] -- [`EventSource`] trait and [`MemoryEventSource`]
//! - [`duration`] -- Timestamp correction and parked-time formatting
//! - [`clock`] -- [`Clock`] trait with system and fixed clocks
//! - [`config`] -- Configuration loading from `lotwatch.yaml`
//! - [`error`] -- [`SourceError`] and [`QueryError`]

pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod reducer;
pub mod service;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, LotwatchConfig};
pub use duration::{ParkedDuration, TimeParked, TimestampCorrection};
pub use error::{QueryError, SourceError};
pub use service::OccupancyService;
pub use source::{EventFilter, EventSource, MemoryEventSource};
