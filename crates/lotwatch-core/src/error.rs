//! Error types for event fetching and occupancy queries.
//!
//! A store that cannot be reached and a plate that was never observed are
//! different outcomes: the former is a [`QueryError::StoreUnavailable`],
//! the latter is a normal value (`false` / `"N/A"`) for presence and
//! duration queries and a [`QueryError::NotFound`] only for registration.

use lotwatch_types::PlateNumber;

/// Errors reported by an [`EventSource`](crate::source::EventSource).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backing store failed to answer (network or storage fault).
    #[error("event store backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// The fetch did not complete within the caller's deadline.
    #[error("event fetch exceeded deadline of {deadline_ms}ms")]
    DeadlineExceeded {
        /// The deadline that was exceeded, in milliseconds.
        deadline_ms: u64,
    },
}

impl SourceError {
    /// Build a [`SourceError::Backend`] from any displayable failure.
    pub fn backend(err: impl core::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

/// Errors returned by the [`OccupancyService`](crate::service::OccupancyService).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The event store could not be read. Safe to retry.
    #[error("event store unavailable: {source}")]
    StoreUnavailable {
        /// The underlying fetch failure.
        #[from]
        source: SourceError,
    },

    /// No event in the log carries the submitted plate.
    #[error("plate {plate} not found in system")]
    NotFound {
        /// The plate that was looked up.
        plate: PlateNumber,
    },
}

impl QueryError {
    /// Whether the caller may retry the same query.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_retryable() {
        let unavailable = QueryError::from(SourceError::DeadlineExceeded { deadline_ms: 250 });
        assert!(unavailable.is_retryable());
        assert_eq!(
            unavailable.to_string(),
            "event store unavailable: event fetch exceeded deadline of 250ms"
        );

        let missing = QueryError::NotFound {
            plate: PlateNumber::new("UNKNOWN999").unwrap(),
        };
        assert!(!missing.is_retryable());
        assert_eq!(missing.to_string(), "plate UNKNOWN999 not found in system");
    }
}
