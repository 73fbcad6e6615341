//! Occupancy queries over the sensor event log.
//!
//! [`OccupancyService`] is a stateless layer: every call fetches what it
//! needs from the [`EventSource`], reduces it, and returns. Nothing is cached
//! between calls, so overlapping polls from many clients need no locking and
//! each result reflects one read of the log.
//!
//! # Operations
//!
//! | Operation | Fetch | Result when nothing matches |
//! |-----------|-------|-----------------------------|
//! | [`snapshot`](OccupancyService::snapshot) | lot | empty snapshot |
//! | [`is_parked`](OccupancyService::is_parked) | lot | `false` |
//! | [`time_parked`](OccupancyService::time_parked) | lot + plate | [`TimeParked::NotObserved`] |
//! | [`register_plate`](OccupancyService::register_plate) | plate | [`QueryError::NotFound`] |
//!
//! Every fetch is bounded by the configured deadline. A failed or timed-out
//! fetch is always [`QueryError::StoreUnavailable`]; it is never folded into
//! one of the "nothing matches" values above.

use std::time::Duration;

use lotwatch_types::{LotId, LotSnapshot, PlateNumber, SensorEvent};

use crate::clock::{Clock, SystemClock};
use crate::config::LotwatchConfig;
use crate::duration::{TimeParked, TimestampCorrection};
use crate::error::{QueryError, SourceError};
use crate::reducer;
use crate::source::{EventFilter, EventSource};

/// Default deadline for a single event store fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers lot snapshots, plate presence and parked-time queries.
#[derive(Debug, Clone)]
pub struct OccupancyService<S, C = SystemClock> {
    source: S,
    clock: C,
    correction: TimestampCorrection,
    fetch_timeout: Duration,
}

impl<S: EventSource> OccupancyService<S> {
    /// Create a service reading the system clock with default policy.
    pub fn new(source: S) -> Self {
        Self {
            source,
            clock: SystemClock,
            correction: TimestampCorrection::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Create a service using the timestamp and query sections of `config`.
    pub fn from_config(source: S, config: &LotwatchConfig) -> Self {
        Self::new(source)
            .with_correction(TimestampCorrection::from_config(&config.timestamps))
            .with_fetch_timeout(Duration::from_millis(config.query.fetch_timeout_ms))
    }
}

impl<S: EventSource, C: Clock> OccupancyService<S, C> {
    /// Replace the clock used for elapsed-time queries.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> OccupancyService<S, C2> {
        OccupancyService {
            source: self.source,
            clock,
            correction: self.correction,
            fetch_timeout: self.fetch_timeout,
        }
    }

    /// Replace the timestamp correction policy.
    #[must_use]
    pub const fn with_correction(mut self, correction: TimestampCorrection) -> Self {
        self.correction = correction;
        self
    }

    /// Set the deadline applied to every event store fetch.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Current occupancy of `lot_id`: one state per sensor that has ever
    /// reported, ordered by sensor id.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::StoreUnavailable`] if the events cannot be
    /// fetched within the deadline.
    pub async fn snapshot(&self, lot_id: &LotId) -> Result<LotSnapshot, QueryError> {
        let events = self
            .bounded(self.source.fetch_events(&EventFilter::for_lot(lot_id.clone())))
            .await?;
        let fetched = events.len();
        let spots = reducer::reduce(events, lot_id);

        tracing::debug!(
            lot = %lot_id,
            fetched,
            spots = spots.len(),
            "Reduced lot events to spot states"
        );

        Ok(LotSnapshot::new(lot_id.clone(), spots.into_values().collect()))
    }

    /// Whether `plate` is currently parked at `lot_id`.
    ///
    /// A plate that was never observed at the lot is simply not parked.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::StoreUnavailable`] if the events cannot be
    /// fetched within the deadline.
    pub async fn is_parked(&self, plate: &PlateNumber, lot_id: &LotId) -> Result<bool, QueryError> {
        let events = self
            .bounded(self.source.fetch_events(&EventFilter::for_lot(lot_id.clone())))
            .await?;
        let parked = reducer::is_plate_parked(&events, plate, lot_id);

        tracing::debug!(plate = %plate, lot = %lot_id, parked, "Checked plate presence");
        Ok(parked)
    }

    /// Time since the latest reading of `plate` at `lot_id`, corrected to
    /// true UTC and floored to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::StoreUnavailable`] if the lookup cannot be
    /// completed within the deadline.
    pub async fn time_parked(
        &self,
        plate: &PlateNumber,
        lot_id: &LotId,
    ) -> Result<TimeParked, QueryError> {
        let latest = self
            .bounded(self.source.fetch_latest_by_plate(plate, Some(lot_id)))
            .await?;

        let Some(event) = latest else {
            tracing::debug!(plate = %plate, lot = %lot_id, "Plate never observed at lot");
            return Ok(TimeParked::NotObserved);
        };

        let elapsed = self.correction.elapsed(event.timestamp, self.clock.now());
        Ok(TimeParked::Parked(elapsed))
    }

    /// Confirm that `plate` exists anywhere in the log before a session
    /// starts tracking it.
    ///
    /// The lookup is deliberately not scoped to a lot. No storage write
    /// happens here; the caller persists the registration.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotFound`] if no event carries the plate, or
    /// [`QueryError::StoreUnavailable`] if the lookup fails.
    pub async fn register_plate(&self, plate: &PlateNumber) -> Result<SensorEvent, QueryError> {
        let latest = self
            .bounded(self.source.fetch_latest_by_plate(plate, None))
            .await?;

        let Some(event) = latest else {
            tracing::info!(plate = %plate, "Plate registration rejected: plate not found");
            return Err(QueryError::NotFound {
                plate: plate.clone(),
            });
        };

        tracing::info!(
            plate = %plate,
            lot = %event.lot_id,
            sensor = %event.sensor_id,
            "Plate registration confirmed"
        );
        Ok(event)
    }

    /// Run a store fetch under the configured deadline.
    async fn bounded<T>(
        &self,
        fetch: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, QueryError> {
        let Ok(result) = tokio::time::timeout(self.fetch_timeout, fetch).await else {
            let deadline_ms = u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(deadline_ms, "Event store fetch exceeded deadline");
            return Err(QueryError::StoreUnavailable {
                source: SourceError::DeadlineExceeded { deadline_ms },
            });
        };

        result.map_err(|source| {
            tracing::warn!(error = %source, "Event store fetch failed");
            QueryError::StoreUnavailable { source }
        })
    }
}
