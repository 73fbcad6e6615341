//! Occupancy monitor for Lotwatch.
//!
//! Polls the sensor event store on a fixed interval and logs per-lot
//! occupancy plus the location and parked time of each watched plate.
//! Runs until interrupted with Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lotwatch.yaml` (or `$LOTWATCH_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Confirm watched plates exist in the event log
//! 5. Poll every configured lot until shutdown

mod error;
mod poll;

use std::path::PathBuf;
use std::time::Duration;

use lotwatch_core::config::LoggingConfig;
use lotwatch_core::{LotwatchConfig, OccupancyService};
use lotwatch_db::{EventStore, PostgresConfig, PostgresPool};
use lotwatch_types::{LotId, PlateNumber};
use tokio::time::MissedTickBehavior;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::MonitorError;

/// Config file used when `LOTWATCH_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "lotwatch.yaml";

/// Environment variable naming an alternative config file.
const CONFIG_PATH_ENV: &str = "LOTWATCH_CONFIG";

/// Application entry point for the monitor.
///
/// # Errors
///
/// Returns an error if configuration, the database connection, or the
/// initial plate confirmation fails.
#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("lotwatch-monitor starting");
    let source = config_path
        .as_deref()
        .map_or_else(|| "defaults".to_owned(), |path| path.display().to_string());
    info!(source = %source, "Configuration loaded");

    let lots = config
        .monitor
        .lots
        .iter()
        .map(LotId::new)
        .collect::<Result<Vec<_>, _>>()?;
    let plates = config
        .monitor
        .watched_plates
        .iter()
        .map(PlateNumber::new)
        .collect::<Result<Vec<_>, _>>()?;

    if lots.is_empty() {
        tracing::warn!("No lots configured under monitor.lots; nothing to poll");
        return Ok(());
    }

    // 3. Connect to PostgreSQL.
    let pool =
        PostgresPool::connect(&PostgresConfig::from_infrastructure(&config.infrastructure)).await?;
    pool.run_migrations().await?;

    let service = OccupancyService::from_config(EventStore::new(pool.pool()), &config);
    info!(
        civil_offset_minutes = config.timestamps.civil_offset_minutes,
        fetch_timeout_ms = config.query.fetch_timeout_ms,
        "Occupancy service ready"
    );

    // 4. Confirm watched plates.
    let plates = poll::confirm_plates(&service, plates).await?;
    info!(
        lots = lots.len(),
        watched_plates = plates.len(),
        poll_interval_ms = config.monitor.poll_interval_ms,
        "Monitoring started"
    );

    // 5. Poll until shutdown.
    let mut interval =
        tokio::time::interval(Duration::from_millis(config.monitor.poll_interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let passes =
        poll::poll_until(&service, &lots, &plates, interval, tokio::signal::ctrl_c()).await?;
    info!(passes, "Shutdown signal received");

    pool.close().await;
    info!("lotwatch-monitor shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration from `$LOTWATCH_CONFIG` or `lotwatch.yaml`.
///
/// Falls back to defaults when the file does not exist. Returns the path
/// that was read, if any.
fn load_config() -> Result<(LotwatchConfig, Option<PathBuf>), MonitorError> {
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = LotwatchConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = LotwatchConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok((config, None))
    }
}
