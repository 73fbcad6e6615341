//! Event store operations on the `sensor_events` table.
//!
//! Readings are the source of truth for occupancy. Every device report
//! produces one immutable row per sensor; nothing is ever updated or
//! deleted. Reads return rows newest first, which the reducer treats as
//! advisory.

use chrono::{DateTime, Utc};
use lotwatch_core::{EventFilter, EventSource, SourceError};
use lotwatch_types::{LotId, PlateNumber, SensorEvent, SensorId, SensorReport};
use sqlx::PgPool;

use crate::error::DbError;

/// Default batch size for event inserts.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Columns selected for every read, in [`EventRow`] order.
const SELECT_COLUMNS: &str =
    "SELECT id, lot_id, sensor_id, device_id, tag_detected, plate_number, timestamp FROM sensor_events";

/// Operations on the `sensor_events` table.
pub struct EventStore<'a> {
    pool: &'a PgPool,
    batch_size: usize,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for inserts.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Batch-insert events into the `sensor_events` table.
    ///
    /// Each chunk of `batch_size` events is a single `INSERT ... SELECT
    /// FROM UNNEST(...)` inside its own transaction, so a chunk is either
    /// fully appended or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if a sensor id does not fit the
    /// column, or [`DbError::Postgres`] if the insert fails.
    pub async fn batch_insert(&self, events: &[SensorEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        for chunk in events.chunks(self.batch_size.max(1)) {
            let len = chunk.len();
            let mut lot_ids = Vec::with_capacity(len);
            let mut sensor_ids = Vec::with_capacity(len);
            let mut device_ids: Vec<Option<String>> = Vec::with_capacity(len);
            let mut tags = Vec::with_capacity(len);
            let mut plates: Vec<Option<String>> = Vec::with_capacity(len);
            let mut timestamps = Vec::with_capacity(len);

            for event in chunk {
                lot_ids.push(event.lot_id.as_str().to_owned());
                sensor_ids.push(i32::try_from(event.sensor_id.get()).map_err(|e| {
                    DbError::InvalidRow(format!("sensor id {} out of range: {e}", event.sensor_id))
                })?);
                device_ids.push(event.device_id.clone());
                tags.push(event.tag_detected);
                plates.push(event.plate_number.as_ref().map(|p| p.as_str().to_owned()));
                timestamps.push(event.timestamp);
            }

            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r"INSERT INTO sensor_events (lot_id, sensor_id, device_id, tag_detected, plate_number, timestamp)
                  SELECT * FROM UNNEST($1::TEXT[], $2::INTEGER[], $3::TEXT[], $4::BOOLEAN[], $5::TEXT[], $6::TIMESTAMPTZ[])",
            )
            .bind(&lot_ids)
            .bind(&sensor_ids)
            .bind(&device_ids)
            .bind(&tags)
            .bind(&plates)
            .bind(&timestamps)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }

        tracing::debug!(count = events.len(), "Inserted sensor events (batch UNNEST)");
        Ok(())
    }

    /// Flatten a device report into events for `lot_id` and append them.
    ///
    /// Returns the number of events written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn ingest_report(
        &self,
        lot_id: &LotId,
        report: SensorReport,
    ) -> Result<usize, DbError> {
        let device_id = report.device_id.clone();
        let events = report.into_events(lot_id);
        self.batch_insert(&events).await?;
        tracing::info!(
            lot = %lot_id,
            device = %device_id,
            readings = events.len(),
            "Stored sensor report"
        );
        Ok(events.len())
    }

    /// Query events matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if a stored row cannot be decoded.
    pub async fn query_events(&self, filter: &EventFilter) -> Result<Vec<SensorEvent>, DbError> {
        let sql = format!(
            "{SELECT_COLUMNS}
              WHERE ($1::TEXT IS NULL OR lot_id = $1)
                AND ($2::TEXT IS NULL OR plate_number = $2)
              ORDER BY timestamp DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(filter.lot_id.as_ref().map(LotId::as_str))
            .bind(filter.plate_number.as_ref().map(PlateNumber::as_str))
            .fetch_all(self.pool)
            .await?;

        tracing::debug!(
            lot = ?filter.lot_id,
            plate = ?filter.plate_number,
            rows = rows.len(),
            "Fetched sensor events"
        );

        rows.into_iter().map(SensorEvent::try_from).collect()
    }

    /// Most recent event carrying `plate`, optionally restricted to a lot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if the stored row cannot be decoded.
    pub async fn latest_by_plate(
        &self,
        plate: &PlateNumber,
        lot_id: Option<&LotId>,
    ) -> Result<Option<SensorEvent>, DbError> {
        let sql = format!(
            "{SELECT_COLUMNS}
              WHERE plate_number = $1
                AND ($2::TEXT IS NULL OR lot_id = $2)
              ORDER BY timestamp DESC, id DESC
              LIMIT 1"
        );
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(plate.as_str())
            .bind(lot_id.map(LotId::as_str))
            .fetch_optional(self.pool)
            .await?;

        row.map(SensorEvent::try_from).transpose()
    }
}

impl EventSource for EventStore<'_> {
    async fn fetch_events(&self, filter: &EventFilter) -> Result<Vec<SensorEvent>, SourceError> {
        Ok(self.query_events(filter).await?)
    }

    async fn fetch_latest_by_plate(
        &self,
        plate: &PlateNumber,
        lot_id: Option<&LotId>,
    ) -> Result<Option<SensorEvent>, SourceError> {
        Ok(self.latest_by_plate(plate, lot_id).await?)
    }
}

/// A row from the `sensor_events` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Auto-incremented row ID (append order).
    pub id: i64,
    /// Parking facility.
    pub lot_id: String,
    /// Spot sensor number.
    pub sensor_id: i32,
    /// Reporting device, if recorded.
    pub device_id: Option<String>,
    /// Whether a tag was sensed.
    pub tag_detected: bool,
    /// Plate read with the tag, if any.
    pub plate_number: Option<String>,
    /// Civil-time reading timestamp labeled as UTC.
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<EventRow> for SensorEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let invalid = |what: String| DbError::InvalidRow(format!("row {}: {what}", row.id));

        let lot_id = LotId::new(&row.lot_id).map_err(|e| invalid(e.to_string()))?;
        let sensor_id = u32::try_from(row.sensor_id)
            .map(SensorId)
            .map_err(|e| invalid(format!("sensor id {}: {e}", row.sensor_id)))?;
        // Blank plates are treated as absent rather than rejected.
        let plate_number = row
            .plate_number
            .as_deref()
            .and_then(|p| PlateNumber::new(p).ok());

        Ok(Self {
            lot_id,
            sensor_id,
            device_id: row.device_id,
            tag_detected: row.tag_detected,
            plate_number,
            timestamp: row.timestamp,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row() -> EventRow {
        EventRow {
            id: 7,
            lot_id: "dlf-mall".to_owned(),
            sensor_id: 3,
            device_id: Some("DLF-SENSOR".to_owned()),
            tag_detected: true,
            plate_number: Some("DL01AB1234".to_owned()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn row_converts_to_event() {
        let event = SensorEvent::try_from(row()).unwrap();
        assert_eq!(event.lot_id.as_str(), "dlf-mall");
        assert_eq!(event.sensor_id, SensorId(3));
        assert_eq!(event.plate_number.unwrap().as_str(), "DL01AB1234");
    }

    #[test]
    fn negative_sensor_id_is_invalid() {
        let mut bad = row();
        bad.sensor_id = -1;
        let err = SensorEvent::try_from(bad).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow(msg) if msg.starts_with("row 7")));
    }

    #[test]
    fn blank_lot_is_invalid() {
        let mut bad = row();
        bad.lot_id = "  ".to_owned();
        assert!(SensorEvent::try_from(bad).is_err());
    }

    #[test]
    fn blank_plate_is_absent() {
        let mut blank = row();
        blank.plate_number = Some(String::new());
        assert_eq!(SensorEvent::try_from(blank).unwrap().plate_number, None);
    }

    #[test]
    fn db_errors_surface_as_backend_failures() {
        let err = SourceError::from(DbError::Config("bad url".to_owned()));
        assert!(matches!(err, SourceError::Backend { message } if message.contains("bad url")));
    }
}
