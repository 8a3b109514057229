use serde::{Deserialize, Serialize};

use crate::{Interval, Symbol, UtcDateTime, ValidationError};

/// One OHLCV observation for a fixed time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume", volume)?;

        if high < low {
            return Err(ValidationError::InvalidCandleRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Degenerate candle from a close-only provider: all four price fields
    /// collapse to the closing price.
    pub fn from_close(ts: UtcDateTime, close: f64, volume: f64) -> Result<Self, ValidationError> {
        Self::new(ts, close, close, close, close, volume)
    }

    /// True when all four price fields are equal (close-only synthesis).
    pub fn is_degenerate(&self) -> bool {
        self.open == self.close && self.high == self.close && self.low == self.close
    }
}

/// Ordered series of candles returned by a provider facade.
///
/// Timestamps are strictly increasing and unique; the normalizer enforces
/// this before the series reaches a caller. The caller owns the series
/// exclusively after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: Symbol,
    /// Identifier actually sent to the upstream (e.g. `BTCUSDT`, `bitcoin`).
    pub provider_symbol: String,
    pub interval: Interval,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(
        symbol: Symbol,
        provider_symbol: impl Into<String>,
        interval: Interval,
        candles: Vec<Candle>,
    ) -> Self {
        Self {
            symbol,
            provider_symbol: provider_symbol.into(),
            interval,
            candles,
        }
    }

    pub fn empty(symbol: Symbol, provider_symbol: impl Into<String>, interval: Interval) -> Self {
        Self::new(symbol, provider_symbol, interval, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
