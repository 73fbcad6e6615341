//! Timestamp correction and parked-duration formatting.
//!
//! Devices stamp readings with their local civil clock (UTC+5:30) but the
//! store labels the value as UTC. [`TimestampCorrection`] is the only place
//! that offset is applied; if some rows are ever written with true UTC the
//! fix belongs here and nowhere else.

use core::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, Serializer};

use crate::config::TimestampConfig;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;

/// Converts stored timestamps to true UTC and measures elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCorrection {
    civil_offset: TimeDelta,
    plausible_max: TimeDelta,
}

impl TimestampCorrection {
    /// Build a correction from the configured policy.
    ///
    /// Values chrono cannot represent are logged and replaced: the offset
    /// by zero, the ceiling by no ceiling. [`LotwatchConfig::validate`]
    /// rejects both before a parsed config gets here.
    ///
    /// [`LotwatchConfig::validate`]: crate::LotwatchConfig::validate
    pub fn from_config(config: &TimestampConfig) -> Self {
        let civil_offset = TimeDelta::try_minutes(config.civil_offset_minutes).unwrap_or_else(|| {
            tracing::warn!(
                civil_offset_minutes = config.civil_offset_minutes,
                "Civil offset out of range; timestamps will not be corrected"
            );
            TimeDelta::zero()
        });
        let plausible_max = TimeDelta::try_hours(config.plausible_max_hours).unwrap_or_else(|| {
            tracing::warn!(
                plausible_max_hours = config.plausible_max_hours,
                "Plausibility ceiling out of range; long stays will not be flagged"
            );
            TimeDelta::MAX
        });
        Self {
            civil_offset,
            plausible_max,
        }
    }

    /// A correction that leaves timestamps untouched.
    pub fn identity() -> Self {
        Self {
            civil_offset: TimeDelta::zero(),
            ..Self::default()
        }
    }

    /// The offset subtracted from every stored timestamp.
    pub const fn civil_offset(&self) -> TimeDelta {
        self.civil_offset
    }

    /// Convert a stored (civil, mislabeled) timestamp to true UTC.
    pub fn correct(&self, stored: DateTime<Utc>) -> DateTime<Utc> {
        stored
            .checked_sub_signed(self.civil_offset)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whole seconds between the corrected `stored` instant and `now`.
    ///
    /// Never negative: a corrected timestamp in the future (clock skew, or a
    /// row that was already true UTC) yields zero. Both that case and
    /// durations above the plausibility ceiling are logged.
    pub fn elapsed(&self, stored: DateTime<Utc>, now: DateTime<Utc>) -> ParkedDuration {
        let corrected = self.correct(stored);
        let delta = now.signed_duration_since(corrected);

        if delta < TimeDelta::zero() {
            tracing::warn!(
                stored = %stored,
                corrected = %corrected,
                now = %now,
                skew_secs = delta.num_seconds(),
                "Corrected timestamp is in the future; clamping parked time to zero"
            );
            return ParkedDuration::ZERO;
        }

        if delta > self.plausible_max {
            tracing::warn!(
                stored = %stored,
                corrected = %corrected,
                elapsed_hours = delta.num_hours(),
                max_hours = self.plausible_max.num_hours(),
                "Parked time exceeds plausibility ceiling"
            );
        }

        ParkedDuration::from_secs(u64::try_from(delta.num_seconds()).unwrap_or(0))
    }
}

impl Default for TimestampCorrection {
    fn default() -> Self {
        Self::from_config(&TimestampConfig::default())
    }
}

/// Continuous parked time in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ParkedDuration(u64);

impl ParkedDuration {
    /// Zero elapsed time.
    pub const ZERO: Self = Self(0);

    /// Build a duration from whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Total whole seconds.
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Whole hours.
    pub const fn hours(self) -> u64 {
        self.0 / SECS_PER_HOUR
    }

    /// Minutes within the current hour.
    pub const fn minutes(self) -> u64 {
        (self.0 % SECS_PER_HOUR) / SECS_PER_MINUTE
    }

    /// Seconds within the current minute.
    pub const fn seconds(self) -> u64 {
        self.0 % SECS_PER_MINUTE
    }
}

impl fmt::Display for ParkedDuration {
    /// `1h 5m 32s`, `2m 0s`, `45s`. Minutes are always shown alongside
    /// hours so `1h 0m 0s` never reads as a bare seconds count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = (self.hours(), self.minutes(), self.seconds());
        if h > 0 {
            write!(f, "{h}h {m}m {s}s")
        } else if m > 0 {
            write!(f, "{m}m {s}s")
        } else {
            write!(f, "{s}s")
        }
    }
}

/// Result of a parked-time query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeParked {
    /// The plate has never been observed at the lot. Renders as `N/A`.
    NotObserved,
    /// Elapsed time since the plate's latest reading.
    Parked(ParkedDuration),
}

impl TimeParked {
    /// The duration, if the plate was observed.
    pub const fn duration(self) -> Option<ParkedDuration> {
        match self {
            Self::NotObserved => None,
            Self::Parked(d) => Some(d),
        }
    }
}

impl fmt::Display for TimeParked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotObserved => f.write_str("N/A"),
            Self::Parked(d) => d.fmt(f),
        }
    }
}

impl Serialize for TimeParked {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
