//! One polling pass over the configured lots and watched plates.
//!
//! Lots are snapshotted concurrently. A lot whose fetch fails is counted
//! and logged; the rest of the pass still completes so one slow lot does
//! not blank the whole report.

use std::future::Future;

use futures::future::join_all;
use lotwatch_core::{Clock, EventSource, OccupancyService, ParkedDuration, QueryError, TimeParked};
use lotwatch_types::{LotId, LotSnapshot, PlateNumber};
use tokio::time::Interval;

/// Aggregate result of one polling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Lots whose snapshot succeeded.
    pub lots_ok: usize,
    /// Lots whose snapshot failed.
    pub lots_failed: usize,
    /// Occupied spots across all successful lots.
    pub occupied: usize,
    /// Available spots across all successful lots.
    pub available: usize,
}

impl PollSummary {
    fn from_results(results: &[Result<LotSnapshot, QueryError>]) -> Self {
        let snapshots = || results.iter().filter_map(|r| r.as_ref().ok());
        Self {
            lots_ok: snapshots().count(),
            lots_failed: results.iter().filter(|r| r.is_err()).count(),
            occupied: snapshots().map(LotSnapshot::occupied_count).sum(),
            available: snapshots().map(LotSnapshot::available_count).sum(),
        }
    }
}

/// Where a watched plate was found on this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateSighting {
    /// Lot the plate is parked at.
    pub lot_id: LotId,
    /// Time since its latest reading there.
    pub time_parked: TimeParked,
}

/// Snapshot every lot concurrently and log the counts.
pub async fn poll_lots<S: EventSource, C: Clock>(
    service: &OccupancyService<S, C>,
    lots: &[LotId],
) -> PollSummary {
    let results = join_all(lots.iter().map(|lot| service.snapshot(lot))).await;

    for (lot, result) in lots.iter().zip(&results) {
        result.as_ref().map_or_else(
            |e| {
                tracing::warn!(
                    lot = %lot,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Lot snapshot failed"
                );
            },
            |snapshot| {
                tracing::info!(
                    lot = %snapshot.lot_id(),
                    occupied = snapshot.occupied_count(),
                    available = snapshot.available_count(),
                    total = snapshot.total_spots(),
                    "Lot occupancy"
                );
            },
        );
    }

    PollSummary::from_results(&results)
}

/// Find the first lot (in configured order) where `plate` is parked.
///
/// # Errors
///
/// Returns [`QueryError::StoreUnavailable`] if any lookup fails.
pub async fn locate_plate<S: EventSource, C: Clock>(
    service: &OccupancyService<S, C>,
    plate: &PlateNumber,
    lots: &[LotId],
) -> Result<Option<PlateSighting>, QueryError> {
    for lot in lots {
        if service.is_parked(plate, lot).await? {
            let time_parked = service.time_parked(plate, lot).await?;
            return Ok(Some(PlateSighting {
                lot_id: lot.clone(),
                time_parked,
            }));
        }
    }
    Ok(None)
}

/// Locate every watched plate concurrently and log where each is parked.
pub async fn watch_plates<S: EventSource, C: Clock>(
    service: &OccupancyService<S, C>,
    plates: &[PlateNumber],
    lots: &[LotId],
) {
    let results = join_all(plates.iter().map(|plate| locate_plate(service, plate, lots))).await;

    for (plate, result) in plates.iter().zip(results) {
        match result {
            Ok(Some(sighting)) => tracing::info!(
                plate = %plate,
                lot = %sighting.lot_id,
                time_parked = %sighting.time_parked,
                parked_secs = sighting.time_parked.duration().map_or(0, ParkedDuration::as_secs),
                "Watched plate parked"
            ),
            Ok(None) => tracing::info!(plate = %plate, "Watched plate not parked"),
            Err(e) => tracing::warn!(plate = %plate, error = %e, "Watched plate lookup failed"),
        }
    }
}

/// Confirm each watched plate exists in the log before tracking it.
///
/// Unknown plates are dropped with a warning.
///
/// # Errors
///
/// Returns [`QueryError::StoreUnavailable`] if the store cannot be read.
pub async fn confirm_plates<S: EventSource, C: Clock>(
    service: &OccupancyService<S, C>,
    plates: Vec<PlateNumber>,
) -> Result<Vec<PlateNumber>, QueryError> {
    let mut confirmed = Vec::with_capacity(plates.len());
    for plate in plates {
        match service.register_plate(&plate).await {
            Ok(_) => confirmed.push(plate),
            Err(QueryError::NotFound { plate: missing }) => {
                tracing::warn!(plate = %missing, "Watched plate has no readings; not tracking it");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(confirmed)
}

/// Run a full pass on every `interval` tick until `shutdown` resolves.
///
/// `shutdown` is created once and polled across passes, so a signal that
/// arrives mid-pass is seen at the next select. Returns the number of
/// completed passes.
///
/// # Errors
///
/// Returns the error `shutdown` resolved with.
pub async fn poll_until<S, C, F>(
    service: &OccupancyService<S, C>,
    lots: &[LotId],
    plates: &[PlateNumber],
    mut interval: Interval,
    shutdown: F,
) -> std::io::Result<u64>
where
    S: EventSource,
    C: Clock,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut passes: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = poll_lots(service, lots).await;
                if summary.lots_failed > 0 {
                    tracing::warn!(
                        failed = summary.lots_failed,
                        ok = summary.lots_ok,
                        "Poll completed with failures"
                    );
                }
                tracing::debug!(
                    occupied = summary.occupied,
                    available = summary.available,
                    "Poll complete"
                );
                watch_plates(service, plates, lots).await;
                passes = passes.saturating_add(1);
            }
            signal = &mut shutdown => {
                signal?;
                return Ok(passes);
            }
        }
    }
}
