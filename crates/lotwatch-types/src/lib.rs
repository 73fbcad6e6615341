//! Shared type definitions for the Lotwatch parking occupancy core.
//!
//! Types defined here are used by the reducer, the query service and the
//! `PostgreSQL` adapter, and flow downstream to `TypeScript` via `ts-rs`
//! for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Identifiers for lots, sensors, plates and users
//! - [`structs`] -- Sensor events, spot state, lot snapshots, device reports

pub mod ids;
pub mod structs;

pub use ids::{IdError, LotId, PlateNumber, SensorId, UserId};
pub use structs::{
    LotSnapshot, PlateRegistration, SensorEvent, SensorReading, SensorReport, SpotKey, SpotState,
};

#[cfg(test)]
mod tests {
    //! Binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // The files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::LotId::export_all();
        let _ = crate::ids::PlateNumber::export_all();
        let _ = crate::ids::SensorId::export_all();
        let _ = crate::ids::UserId::export_all();
        let _ = crate::structs::SensorEvent::export_all();
        let _ = crate::structs::SpotState::export_all();
        let _ = crate::structs::LotSnapshot::export_all();
        let _ = crate::structs::SensorReport::export_all();
        let _ = crate::structs::PlateRegistration::export_all();
    }
}
