//! Raw provider records to canonical candles.
//!
//! Providers disagree on payload shape, epoch units, field completeness, and
//! page-edge behavior. Parsers reduce every payload to [`RawCandle`] records
//! (epoch seconds, close always present, everything else optional); this
//! module then produces the canonical ordered series: OHLC synthesis for
//! close-only records, zero-volume defaulting, first-occurrence de-dup,
//! ascending sort, and defensive range clamping.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{Candle, UtcDateTime};

/// One provider record after payload parsing, before canonicalization.
///
/// `ts` is always whole epoch seconds; parsers for millisecond providers
/// divide at parse time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandle {
    pub ts: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
}

impl RawCandle {
    pub fn full(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(volume),
        }
    }

    /// Close-only record; OHLC synthesis happens during normalization.
    pub fn close_only(ts: i64, close: f64, volume: Option<f64>) -> Self {
        Self {
            ts,
            open: None,
            high: None,
            low: None,
            close,
            volume,
        }
    }
}

/// Normalize raw records into an ordered, de-duplicated, range-bounded
/// candle list.
///
/// - `bounds`: inclusive `[start, end]` epoch-second clamp; providers may
///   over-return at range edges.
/// - `bucket_secs`: when set, timestamps snap down to the bucket boundary
///   and only the first record per bucket survives. Used when the provider
///   serves finer granularity than requested.
///
/// De-duplication keeps the first occurrence in arrival order, so candles
/// reintroduced by overlapping page boundaries never change an earlier page's
/// data. Empty or entirely invalid input yields an empty list, never an
/// error: "no data available" is a normal outcome.
pub fn normalize(
    raw: Vec<RawCandle>,
    bounds: Option<(i64, i64)>,
    bucket_secs: Option<i64>,
) -> Vec<Candle> {
    let record_count = raw.len();
    let mut by_ts: BTreeMap<i64, Candle> = BTreeMap::new();
    let mut skipped = 0_usize;

    for record in raw {
        let ts_secs = match bucket_secs {
            Some(bucket) if bucket > 0 => record.ts - record.ts.rem_euclid(bucket),
            _ => record.ts,
        };

        if let Some((start, end)) = bounds {
            if ts_secs < start || ts_secs > end {
                continue;
            }
        }

        let candle = match build_candle(ts_secs, &record) {
            Ok(candle) => candle,
            Err(reason) => {
                skipped += 1;
                warn!(ts = record.ts, %reason, "skipping invalid provider record");
                continue;
            }
        };

        by_ts.entry(ts_secs).or_insert(candle);
    }

    if skipped > 0 {
        warn!(skipped, total = record_count, "dropped unusable records");
    }
    debug!(
        input = record_count,
        output = by_ts.len(),
        "normalized provider records"
    );

    by_ts.into_values().collect()
}

fn build_candle(ts_secs: i64, record: &RawCandle) -> Result<Candle, String> {
    let ts = UtcDateTime::from_unix_timestamp(ts_secs).map_err(|e| e.to_string())?;
    let volume = record.volume.unwrap_or(0.0);

    match (record.open, record.high, record.low) {
        (Some(open), Some(high), Some(low)) => {
            Candle::new(ts, open, high, low, record.close, volume).map_err(|e| e.to_string())
        }
        // Any missing price field degrades the record to close-only.
        _ => Candle::from_close(ts, record.close, volume).map_err(|e| e.to_string()),
    }
}
