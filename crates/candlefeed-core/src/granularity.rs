//! Canonical interval to provider-native granularity mapping.
//!
//! Providers expose bucket sizes as a native time unit plus an aggregation
//! multiplier (CryptoCompare's `histohour` with `aggregate=2` serves 2h
//! candles). The mapper picks the largest supported unit that divides the
//! requested interval; when no unit fits it degrades to the provider default
//! rather than failing, since a granularity mismatch is a quality-of-result
//! concern and not a hard error.

use crate::Interval;

/// Native time units a unit-based provider endpoint can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranularityUnit {
    Minute,
    Hour,
    Day,
}

impl GranularityUnit {
    pub const fn secs(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Endpoint path fragment used by histo-style APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

/// A provider-native granularity: unit plus aggregation factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeGranularity {
    pub unit: GranularityUnit,
    pub aggregate: u32,
}

impl NativeGranularity {
    pub const fn of(unit: GranularityUnit, aggregate: u32) -> Self {
        Self { unit, aggregate }
    }

    /// Width of one aggregated bucket in seconds; the pagination cursor
    /// advances by this step.
    pub const fn step_secs(self) -> i64 {
        self.unit.secs() * self.aggregate as i64
    }
}

/// Map a canonical interval onto the largest supported unit that divides it
/// exactly, recording the aggregation factor. Falls back to `default` when
/// every supported unit is coarser than the interval (e.g. 30m requested
/// from a day-only provider).
pub fn fit(
    interval: Interval,
    units: &[GranularityUnit],
    default: NativeGranularity,
) -> NativeGranularity {
    let want = interval.secs();
    let mut best: Option<GranularityUnit> = None;

    for &unit in units {
        if unit.secs() <= want && want % unit.secs() == 0 {
            let coarser = best.map(|b| unit.secs() > b.secs()).unwrap_or(true);
            if coarser {
                best = Some(unit);
            }
        }
    }

    match best {
        Some(unit) => NativeGranularity::of(unit, (want / unit.secs()) as u32),
        None => default,
    }
}
