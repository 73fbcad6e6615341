//! The event store collaborator and an in-memory implementation.
//!
//! The query service never talks to a database directly. It reads through
//! [`EventSource`], which the `PostgreSQL` adapter implements for
//! production and [`MemoryEventSource`] implements for tests and local
//! development. Result ordering is advisory; the reducer re-derives the
//! latest event per key from timestamps.

use std::sync::Arc;

use lotwatch_types::{LotId, PlateNumber, SensorEvent};
use tokio::sync::RwLock;

use crate::error::SourceError;
use crate::reducer;

/// Which events to fetch. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Restrict to one parking facility.
    pub lot_id: Option<LotId>,
    /// Restrict to events carrying this plate.
    pub plate_number: Option<PlateNumber>,
}

impl EventFilter {
    /// Every event for one lot.
    pub const fn for_lot(lot_id: LotId) -> Self {
        Self {
            lot_id: Some(lot_id),
            plate_number: None,
        }
    }

    /// Every event carrying one plate, across all lots.
    pub const fn for_plate(plate_number: PlateNumber) -> Self {
        Self {
            lot_id: None,
            plate_number: Some(plate_number),
        }
    }

    /// Additionally restrict to a lot.
    #[must_use]
    pub fn in_lot(mut self, lot_id: Option<LotId>) -> Self {
        self.lot_id = lot_id;
        self
    }

    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &SensorEvent) -> bool {
        self.lot_id.as_ref().is_none_or(|lot| &event.lot_id == lot)
            && self
                .plate_number
                .as_ref()
                .is_none_or(|plate| event.has_plate(plate))
    }
}

/// Read access to the append-only sensor event log.
pub trait EventSource: Send + Sync {
    /// Fetch all events matching `filter`, newest first by convention.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Backend`] if the store cannot be read.
    fn fetch_events(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<SensorEvent>, SourceError>> + Send;

    /// Fetch the most recent event carrying `plate`, optionally in one lot.
    ///
    /// The default fetches the matching sequence and keeps the maximum
    /// timestamp; stores that can do better should override it.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Backend`] if the store cannot be read.
    fn fetch_latest_by_plate(
        &self,
        plate: &PlateNumber,
        lot_id: Option<&LotId>,
    ) -> impl Future<Output = Result<Option<SensorEvent>, SourceError>> + Send {
        async move {
            let filter = EventFilter::for_plate(plate.clone()).in_lot(lot_id.cloned());
            let events = self.fetch_events(&filter).await?;
            Ok(reducer::latest_for_plate(&events, plate, lot_id).cloned())
        }
    }
}

impl<S: EventSource> EventSource for Arc<S> {
    fn fetch_events(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<SensorEvent>, SourceError>> + Send {
        S::fetch_events(self, filter)
    }

    fn fetch_latest_by_plate(
        &self,
        plate: &PlateNumber,
        lot_id: Option<&LotId>,
    ) -> impl Future<Output = Result<Option<SensorEvent>, SourceError>> + Send {
        S::fetch_latest_by_plate(self, plate, lot_id)
    }
}

/// An in-memory, shareable event log.
///
/// Clones share the same log, so a test can keep one handle for appending
/// while the service reads through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: Arc<RwLock<Vec<SensorEvent>>>,
}

impl MemoryEventSource {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log pre-populated with `events` (in append order).
    pub fn with_events(events: Vec<SensorEvent>) -> Self {
        Self {
            events: Arc::new(RwLock::new(events)),
        }
    }

    /// Append one event.
    pub async fn append(&self, event: SensorEvent) {
        self.events.write().await.push(event);
    }

    /// Append many events in order.
    pub async fn extend(&self, events: impl IntoIterator<Item = SensorEvent>) {
        self.events.write().await.extend(events);
    }

    /// Number of events in the log.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl EventSource for MemoryEventSource {
    async fn fetch_events(&self, filter: &EventFilter) -> Result<Vec<SensorEvent>, SourceError> {
        let events = self.events.read().await;
        // Newest appended first, mirroring the store's descending convention.
        Ok(events
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use lotwatch_types::SensorId;

    use super::*;

    fn event(lot: &str, sensor: u32, plate: Option<&str>, secs: i64) -> SensorEvent {
        SensorEvent {
            lot_id: LotId::new(lot).unwrap(),
            sensor_id: SensorId(sensor),
            device_id: None,
            tag_detected: plate.is_some(),
            plate_number: plate.map(|p| PlateNumber::new(p).unwrap()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[test]
    fn filter_matches_lot_and_plate() {
        let e = event("dlf-mall", 1, Some("DL01AB1234"), 0);
        let lot = LotId::new("dlf-mall").unwrap();
        let plate = PlateNumber::new("DL01AB1234").unwrap();

        assert!(EventFilter::default().matches(&e));
        assert!(EventFilter::for_lot(lot.clone()).matches(&e));
        assert!(EventFilter::for_plate(plate.clone()).in_lot(Some(lot)).matches(&e));
        assert!(!EventFilter::for_lot(LotId::new("igi-airport").unwrap()).matches(&e));
        assert!(!EventFilter::for_plate(PlateNumber::new("OTHER").unwrap()).matches(&e));
    }

    #[tokio::test]
    async fn memory_source_returns_newest_first() {
        let source = MemoryEventSource::new();
        source.append(event("dlf-mall", 1, None, 0)).await;
        source.append(event("dlf-mall", 2, None, 10)).await;
        source.append(event("igi-airport", 1, None, 20)).await;
        assert_eq!(source.len().await, 3);

        let lot = LotId::new("dlf-mall").unwrap();
        let events = source.fetch_events(&EventFilter::for_lot(lot)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.first().unwrap().sensor_id, SensorId(2));
    }

    #[tokio::test]
    async fn default_latest_by_plate_takes_maximum() {
        let source = MemoryEventSource::with_events(vec![
            event("dlf-mall", 1, Some("DL01AB1234"), 30),
            event("dlf-mall", 2, Some("DL01AB1234"), 90),
            event("igi-airport", 3, Some("DL01AB1234"), 60),
        ]);
        let plate = PlateNumber::new("DL01AB1234").unwrap();
        let mall = LotId::new("dlf-mall").unwrap();

        let anywhere = source.fetch_latest_by_plate(&plate, None).await.unwrap().unwrap();
        assert_eq!(anywhere.sensor_id, SensorId(2));

        let airport = LotId::new("igi-airport").unwrap();
        let scoped = source
            .fetch_latest_by_plate(&plate, Some(&airport))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scoped.sensor_id, SensorId(3));

        let missing = PlateNumber::new("UNKNOWN999").unwrap();
        assert!(source.fetch_latest_by_plate(&missing, Some(&mall)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_the_log() {
        let writer = MemoryEventSource::new();
        let reader = Arc::new(writer.clone());
        assert!(reader.is_empty().await);
        writer.extend(vec![event("dlf-mall", 1, None, 0)]).await;
        let events = reader.fetch_events(&EventFilter::default()).await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
