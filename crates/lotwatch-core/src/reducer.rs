//! Reduction of the raw event log to the latest state per spot.
//!
//! The store returns events newest-first by convention, but nothing here
//! relies on that: every fold keeps, per key, the event with the greatest
//! timestamp and only replaces it on a strictly greater one. Two events
//! with identical timestamps for the same key resolve to whichever the
//! source yielded first.

use std::collections::BTreeMap;

use lotwatch_types::{LotId, PlateNumber, SensorEvent, SensorId, SpotKey, SpotState};

/// Reduce events from any number of lots to one state per physical spot.
pub fn reduce_all<I>(events: I) -> BTreeMap<SpotKey, SpotState>
where
    I: IntoIterator<Item = SensorEvent>,
{
    events
        .into_iter()
        .fold(BTreeMap::new(), |mut latest: BTreeMap<SpotKey, SensorEvent>, event| {
            let key = event.spot_key();
            let newer = latest
                .get(&key)
                .is_none_or(|current| event.timestamp > current.timestamp);
            if newer {
                latest.insert(key, event);
            }
            latest
        })
        .into_iter()
        .map(|(key, event)| (key, SpotState::from(event)))
        .collect()
}

/// Reduce the events of one lot to one state per sensor.
///
/// Events belonging to other lots are ignored. An empty input yields an
/// empty map.
pub fn reduce<I>(events: I, lot_id: &LotId) -> BTreeMap<SensorId, SpotState>
where
    I: IntoIterator<Item = SensorEvent>,
{
    reduce_all(events.into_iter().filter(|e| &e.lot_id == lot_id))
        .into_iter()
        .map(|(key, state)| (key.sensor_id, state))
        .collect()
}

/// Return the greatest-timestamp event satisfying `predicate`.
pub fn latest_matching<'a, I, P>(events: I, mut predicate: P) -> Option<&'a SensorEvent>
where
    I: IntoIterator<Item = &'a SensorEvent>,
    P: FnMut(&SensorEvent) -> bool,
{
    events
        .into_iter()
        .filter(|e| predicate(e))
        .fold(None, |best: Option<&SensorEvent>, event| {
            Some(
                best.filter(|current| current.timestamp >= event.timestamp)
                    .unwrap_or(event),
            )
        })
}

/// Latest event carrying `plate`, optionally restricted to one lot.
pub fn latest_for_plate<'a, I>(
    events: I,
    plate: &PlateNumber,
    lot_id: Option<&LotId>,
) -> Option<&'a SensorEvent>
where
    I: IntoIterator<Item = &'a SensorEvent>,
{
    latest_matching(events, |e| {
        e.has_plate(plate) && lot_id.is_none_or(|lot| &e.lot_id == lot)
    })
}

/// Whether `plate` is currently parked in `lot_id`.
///
/// The plate's latest event in the lot must report a detected tag, and no
/// later reading on the same sensor may have superseded it (a vacated spot
/// reports `tag_detected = false` without a plate).
pub fn is_plate_parked(events: &[SensorEvent], plate: &PlateNumber, lot_id: &LotId) -> bool {
    let Some(sighting) = latest_for_plate(events, plate, Some(lot_id)) else {
        return false;
    };
    if !sighting.tag_detected {
        return false;
    }

    latest_matching(events, |e| {
        &e.lot_id == lot_id && e.sensor_id == sighting.sensor_id
    })
    .is_some_and(|current| current.tag_detected && current.has_plate(plate))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn lot(id: &str) -> LotId {
        LotId::new(id).unwrap()
    }

    fn plate(p: &str) -> PlateNumber {
        PlateNumber::new(p).unwrap()
    }

    fn event(lot_id: &str, sensor: u32, tag: bool, p: Option<&str>, secs: i64) -> SensorEvent {
        SensorEvent {
            lot_id: lot(lot_id),
            sensor_id: SensorId(sensor),
            device_id: Some("DLF-SENSOR".to_owned()),
            tag_detected: tag,
            plate_number: p.map(plate),
            timestamp: t0() + Duration::seconds(secs),
        }
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(reduce(Vec::<SensorEvent>::new(), &lot("dlf-mall")).is_empty());
        assert!(reduce_all(Vec::<SensorEvent>::new()).is_empty());
    }

    #[test]
    fn keeps_one_state_per_sensor_with_max_timestamp() {
        // Deliberately shuffled: oldest, newest, middle.
        let events = vec![
            event("dlf-mall", 1, true, Some("A"), 0),
            event("dlf-mall", 1, false, None, 20),
            event("dlf-mall", 1, true, Some("B"), 10),
            event("dlf-mall", 2, true, Some("C"), 5),
            event("dlf-mall", 3, false, None, 7),
            event("dlf-mall", 3, true, Some("D"), 3),
        ];

        let spots = reduce(events, &lot("dlf-mall"));
        assert_eq!(spots.len(), 3);
        assert_eq!(spots[&SensorId(1)].timestamp, t0() + Duration::seconds(20));
        assert!(!spots[&SensorId(1)].tag_detected);
        assert_eq!(spots[&SensorId(2)].plate_number, Some(plate("C")));
        assert_eq!(spots[&SensorId(3)].timestamp, t0() + Duration::seconds(7));
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let mut events = vec![
            event("dlf-mall", 1, true, Some("A"), 0),
            event("dlf-mall", 1, false, None, 30),
            event("dlf-mall", 2, true, Some("B"), 15),
            event("dlf-mall", 2, false, None, 5),
        ];
        let forward = reduce(events.clone(), &lot("dlf-mall"));
        events.reverse();
        let backward = reduce(events, &lot("dlf-mall"));
        assert_eq!(forward, backward);
    }

    #[test]
    fn other_lots_are_out_of_scope() {
        let events = vec![
            event("dlf-mall", 1, true, Some("A"), 0),
            event("igi-airport", 1, false, None, 10),
            event("igi-airport", 2, true, Some("B"), 10),
        ];

        let spots = reduce(events.clone(), &lot("dlf-mall"));
        assert_eq!(spots.len(), 1);
        assert!(spots[&SensorId(1)].tag_detected);

        let all = reduce_all(events);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn ties_keep_the_first_event_seen() {
        let events = vec![
            event("dlf-mall", 1, true, Some("FIRST"), 0),
            event("dlf-mall", 1, true, Some("SECOND"), 0),
        ];
        let spots = reduce(events, &lot("dlf-mall"));
        assert_eq!(spots[&SensorId(1)].plate_number, Some(plate("FIRST")));
    }

    #[test]
    fn latest_for_plate_filters_by_lot() {
        let events = vec![
            event("dlf-mall", 1, true, Some("DL01AB1234"), 0),
            event("igi-airport", 4, true, Some("DL01AB1234"), 60),
        ];
        let p = plate("DL01AB1234");

        let anywhere = latest_for_plate(&events, &p, None).unwrap();
        assert_eq!(anywhere.lot_id, lot("igi-airport"));

        let mall = latest_for_plate(&events, &p, Some(&lot("dlf-mall"))).unwrap();
        assert_eq!(mall.sensor_id, SensorId(1));

        assert!(latest_for_plate(&events, &plate("UNKNOWN"), None).is_none());
    }

    #[test]
    fn vacated_spot_means_not_parked() {
        let events = vec![
            event("dlf-mall", 1, true, Some("DL01AB1234"), 0),
            event("dlf-mall", 1, false, None, 10),
        ];
        assert!(!is_plate_parked(&events, &plate("DL01AB1234"), &lot("dlf-mall")));
    }

    #[test]
    fn detected_plate_still_at_spot_is_parked() {
        let events = vec![
            event("dlf-mall", 1, false, None, 0),
            event("dlf-mall", 1, true, Some("DL01AB1234"), 10),
            event("dlf-mall", 2, false, None, 20),
        ];
        assert!(is_plate_parked(&events, &plate("DL01AB1234"), &lot("dlf-mall")));
        assert!(!is_plate_parked(&events, &plate("DL01AB1234"), &lot("igi-airport")));
    }

    #[test]
    fn latest_plate_event_without_tag_is_not_parked() {
        let events = vec![
            event("dlf-mall", 1, true, Some("DL01AB1234"), 0),
            event("dlf-mall", 1, false, Some("DL01AB1234"), 10),
        ];
        assert!(!is_plate_parked(&events, &plate("DL01AB1234"), &lot("dlf-mall")));
    }

    #[test]
    fn unknown_plate_is_not_parked() {
        let events = vec![event("dlf-mall", 1, true, Some("A"), 0)];
        assert!(!is_plate_parked(&events, &plate("B"), &lot("dlf-mall")));
        assert!(!is_plate_parked(&[], &plate("B"), &lot("dlf-mall")));
    }
}
