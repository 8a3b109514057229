//! # Domain Models
//!
//! Canonical, provider-independent types for candle data.
//!
//! All models validate their invariants at construction:
//!
//! ```rust,ignore
//! use candlefeed_core::{Candle, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-01-01T00:00:00Z")?;
//! let candle = Candle::new(ts, 100.0, 105.0, 95.0, 102.0, 1000.0)?;
//!
//! // high < low is unrepresentable
//! let invalid = Candle::new(ts, 100.0, 95.0, 105.0, 102.0, 1000.0);
//! assert!(matches!(invalid, Err(ValidationError::InvalidCandleRange)));
//! ```
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Candle`] | One OHLCV observation for a time bucket |
//! | [`CandleSeries`] | Ordered, de-duplicated candles for a symbol/interval |
//! | [`Symbol`] | Validated canonical ticker |
//! | [`Interval`] | Canonical bucket width (1m through 1d) |
//! | [`UtcDateTime`] | UTC-only RFC3339 timestamp |

mod candle;
mod interval;
mod symbol;
mod timestamp;

pub use candle::{Candle, CandleSeries};
pub use interval::Interval;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
