//! Core record types: raw sensor events, derived spot state, lot snapshots,
//! device reports and plate registrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::ids::{LotId, PlateNumber, SensorId, UserId};

// ---------------------------------------------------------------------------
// Sensor events
// ---------------------------------------------------------------------------

/// A single reading from one spot sensor.
///
/// Events are immutable and append-only. The `timestamp` is written by the
/// devices in local civil time but labeled as UTC; consumers that compute
/// elapsed time must correct it before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorEvent {
    /// The parking facility the sensor belongs to.
    pub lot_id: LotId,
    /// The spot sensor that produced the reading.
    pub sensor_id: SensorId,
    /// The device that relayed the reading, if recorded.
    pub device_id: Option<String>,
    /// Whether a vehicle tag is currently sensed at the spot.
    pub tag_detected: bool,
    /// The identified plate, present only for detected vehicles.
    pub plate_number: Option<PlateNumber>,
    /// When the reading was taken (civil time labeled as UTC).
    pub timestamp: DateTime<Utc>,
}

impl SensorEvent {
    /// The `(lot, sensor)` pair identifying the physical spot.
    pub fn spot_key(&self) -> SpotKey {
        SpotKey {
            lot_id: self.lot_id.clone(),
            sensor_id: self.sensor_id,
        }
    }

    /// Whether this event carries the given plate.
    pub fn has_plate(&self, plate: &PlateNumber) -> bool {
        self.plate_number.as_ref() == Some(plate)
    }
}

/// Key of a physical spot across all lots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotKey {
    /// The parking facility.
    pub lot_id: LotId,
    /// The spot sensor within the facility.
    pub sensor_id: SensorId,
}

// ---------------------------------------------------------------------------
// Derived state
// ---------------------------------------------------------------------------

/// The latest known state of one spot.
///
/// Materialized from the event log on every query and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpotState {
    /// The parking facility.
    pub lot_id: LotId,
    /// The spot sensor.
    pub sensor_id: SensorId,
    /// The device of the latest reading, if recorded.
    pub device_id: Option<String>,
    /// Whether the spot is occupied.
    pub tag_detected: bool,
    /// The plate parked at the spot, if identified.
    pub plate_number: Option<PlateNumber>,
    /// Timestamp of the latest reading (uncorrected).
    pub timestamp: DateTime<Utc>,
}

impl SpotState {
    /// Whether a vehicle currently occupies the spot.
    pub const fn is_occupied(&self) -> bool {
        self.tag_detected
    }
}

impl From<SensorEvent> for SpotState {
    fn from(event: SensorEvent) -> Self {
        Self {
            lot_id: event.lot_id,
            sensor_id: event.sensor_id,
            device_id: event.device_id,
            tag_detected: event.tag_detected,
            plate_number: event.plate_number,
            timestamp: event.timestamp,
        }
    }
}

/// Occupancy of one lot at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LotSnapshot {
    lot_id: LotId,
    spots: Vec<SpotState>,
    occupied_count: usize,
    available_count: usize,
    total_spots: usize,
}

impl LotSnapshot {
    /// Build a snapshot from the current spot states of a lot.
    pub fn new(lot_id: LotId, spots: Vec<SpotState>) -> Self {
        let total_spots = spots.len();
        let occupied_count = spots.iter().filter(|s| s.is_occupied()).count();
        Self {
            lot_id,
            spots,
            occupied_count,
            available_count: total_spots.saturating_sub(occupied_count),
            total_spots,
        }
    }

    /// The lot this snapshot describes.
    pub const fn lot_id(&self) -> &LotId {
        &self.lot_id
    }

    /// Every spot that has ever reported, one entry per sensor.
    pub fn spots(&self) -> &[SpotState] {
        &self.spots
    }

    /// Number of spots currently sensing a vehicle.
    pub const fn occupied_count(&self) -> usize {
        self.occupied_count
    }

    /// Number of spots currently free.
    pub const fn available_count(&self) -> usize {
        self.available_count
    }

    /// Number of distinct spots known for the lot.
    pub const fn total_spots(&self) -> usize {
        self.total_spots
    }

    /// Spots currently sensing a vehicle.
    pub fn occupied(&self) -> impl Iterator<Item = &SpotState> {
        self.spots.iter().filter(|s| s.is_occupied())
    }

    /// Spots currently free.
    pub fn available(&self) -> impl Iterator<Item = &SpotState> {
        self.spots.iter().filter(|s| !s.is_occupied())
    }
}

// ---------------------------------------------------------------------------
// Device ingestion
// ---------------------------------------------------------------------------

/// One sensor's entry inside a [`SensorReport`].
///
/// The wire names (`name_plate_id`, `rfid_sensors`) are the ones the
/// `ESP32` firmware sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorReading {
    /// The spot sensor.
    pub sensor_id: SensorId,
    /// Whether a tag was sensed.
    pub tag_detected: bool,
    /// The plate read alongside the tag, if any. Blank values are absent.
    #[serde(
        rename = "name_plate_id",
        alias = "plate_number",
        default,
        deserialize_with = "blank_plate_as_none"
    )]
    pub plate_number: Option<PlateNumber>,
}

/// A batch of readings pushed by one device at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorReport {
    /// The reporting device.
    pub device_id: String,
    /// When the device sampled its sensors (civil time labeled as UTC).
    pub timestamp: DateTime<Utc>,
    /// One entry per sensor wired to the device.
    #[serde(rename = "rfid_sensors", alias = "sensors")]
    pub sensors: Vec<SensorReading>,
}

fn blank_plate_as_none<'de, D>(deserializer: D) -> Result<Option<PlateNumber>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|p| PlateNumber::new(p).ok()))
}

impl SensorReport {
    /// Flatten the report into one [`SensorEvent`] per sensor.
    ///
    /// Plates are dropped from readings that did not detect a tag.
    pub fn into_events(self, lot_id: &LotId) -> Vec<SensorEvent> {
        let Self {
            device_id,
            timestamp,
            sensors,
        } = self;
        sensors
            .into_iter()
            .map(|reading| SensorEvent {
                lot_id: lot_id.clone(),
                sensor_id: reading.sensor_id,
                device_id: Some(device_id.clone()),
                tag_detected: reading.tag_detected,
                plate_number: reading.plate_number.filter(|_| reading.tag_detected),
                timestamp,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Plate registration
// ---------------------------------------------------------------------------

/// A user's tracked plate, accepted after the plate was found in the log.
///
/// The session layer owns persistence; this type only carries the accepted
/// value together with the event that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlateRegistration {
    /// The user whose session tracks the plate.
    pub user_id: UserId,
    /// The tracked plate.
    pub plate_number: PlateNumber,
    /// The most recent event seen for the plate at registration time.
    pub confirmed_by: SensorEvent,
}

impl PlateRegistration {
    /// Pair a user with the event confirming their plate exists.
    ///
    /// Returns `None` if the event carries no plate.
    pub fn new(user_id: UserId, confirmed_by: SensorEvent) -> Option<Self> {
        let plate_number = confirmed_by.plate_number.clone()?;
        Some(Self {
            user_id,
            plate_number,
            confirmed_by,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn lot() -> LotId {
        LotId::new("dlf-mall").unwrap()
    }

    fn state(sensor: u32, occupied: bool) -> SpotState {
        SpotState {
            lot_id: lot(),
            sensor_id: SensorId(sensor),
            device_id: None,
            tag_detected: occupied,
            plate_number: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn snapshot_counts_occupancy() {
        let snapshot = LotSnapshot::new(
            lot(),
            vec![state(1, true), state(2, false), state(3, true)],
        );
        assert_eq!(snapshot.total_spots(), 3);
        assert_eq!(snapshot.occupied_count(), 2);
        assert_eq!(snapshot.available_count(), 1);
        assert_eq!(snapshot.available().next().unwrap().sensor_id, SensorId(2));
        assert_eq!(snapshot.occupied().count(), 2);
    }

    #[test]
    fn empty_snapshot_has_zero_counts() {
        let snapshot = LotSnapshot::new(lot(), Vec::new());
        assert_eq!(snapshot.total_spots(), 0);
        assert_eq!(snapshot.available_count(), 0);
    }

    #[test]
    fn report_flattens_into_events() {
        let report = SensorReport {
            device_id: "esp32_1".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            sensors: vec![
                SensorReading {
                    sensor_id: SensorId(1),
                    tag_detected: true,
                    plate_number: Some(PlateNumber::new("DL01AB1234").unwrap()),
                },
                SensorReading {
                    sensor_id: SensorId(2),
                    tag_detected: false,
                    plate_number: Some(PlateNumber::new("STALE").unwrap()),
                },
            ],
        };

        let events = report.into_events(&lot());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].device_id.as_deref(), Some("esp32_1"));
        assert!(events[0].has_plate(&PlateNumber::new("DL01AB1234").unwrap()));
        assert_eq!(events[1].plate_number, None);
        assert_eq!(events[0].timestamp, events[1].timestamp);
    }

    #[test]
    fn report_deserializes_without_plates() {
        let json = r#"{
            "device_id": "esp32_1",
            "timestamp": "2024-01-01T12:00:00Z",
            "sensors": [{"sensor_id": 4, "tag_detected": false}]
        }"#;
        let report: SensorReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.sensors[0].sensor_id, SensorId(4));
        assert_eq!(report.sensors[0].plate_number, None);
    }

    #[test]
    fn report_parses_firmware_payload() {
        let json = r#"{
            "device_id": "esp32_1",
            "timestamp": "2024-01-01T12:00:00Z",
            "rfid_sensors": [
                {"sensor_id": 1, "tag_detected": true, "name_plate_id": " DL01AB1234 "},
                {"sensor_id": 2, "tag_detected": false, "name_plate_id": ""}
            ]
        }"#;
        let report: SensorReport = serde_json::from_str(json).unwrap();
        let events = report.into_events(&lot());
        assert_eq!(events.len(), 2);
        assert!(events[0].has_plate(&PlateNumber::new("DL01AB1234").unwrap()));
        assert_eq!(events[1].plate_number, None);
    }

    #[test]
    fn blank_lot_in_event_is_rejected() {
        let json = r#"{
            "lot_id": "  ",
            "sensor_id": 1,
            "device_id": null,
            "tag_detected": false,
            "plate_number": null,
            "timestamp": "2024-01-01T12:00:00Z"
        }"#;
        assert!(serde_json::from_str::<SensorEvent>(json).is_err());
    }

    #[test]
    fn registration_requires_a_plate() {
        let mut event = SensorEvent {
            lot_id: lot(),
            sensor_id: SensorId(1),
            device_id: None,
            tag_detected: false,
            plate_number: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        };
        assert!(PlateRegistration::new(UserId::new(), event.clone()).is_none());

        event.plate_number = Some(PlateNumber::new("DL01AB1234").unwrap());
        let registration = PlateRegistration::new(UserId::new(), event).unwrap();
        assert_eq!(registration.plate_number.as_str(), "DL01AB1234");
    }
}
