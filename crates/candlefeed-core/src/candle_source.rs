//! Candle source trait and request/response types.
//!
//! This module defines the facade contract (`CandleSource`) every provider
//! implementation follows, along with the two request shapes and the
//! discriminated fetch outcome.
//!
//! # Operations
//!
//! | Operation | Request | Response | Description |
//! |-----------|---------|----------|-------------|
//! | Historical | [`HistoricalRequest`] | [`FetchOutcome`] | Closed-range paginated fetch |
//! | Recent | [`RecentRequest`] | [`FetchOutcome`] | Trailing-N fetch |
//!
//! # Example
//!
//! ```rust,ignore
//! use candlefeed_core::{BinanceSource, CandleSource, HistoricalRequest, Interval, Symbol, UtcDateTime};
//!
//! async fn fetch(source: &BinanceSource) -> Result<(), Box<dyn std::error::Error>> {
//!     let request = HistoricalRequest::new(
//!         Symbol::parse("BTC")?,
//!         Interval::FifteenMinutes,
//!         UtcDateTime::parse("2024-01-01T00:00:00Z")?,
//!         UtcDateTime::parse("2024-01-01T01:00:00Z")?,
//!     )?;
//!     let outcome = source.fetch_historical(request).await?;
//!     for candle in &outcome.series.candles {
//!         println!("{}: {:.2}", candle.ts, candle.close);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{CandleSeries, Interval, ProviderId, Symbol, UtcDateTime};

/// Facade-level error classification.
///
/// `Transport`, `Protocol`, and `SchemaMismatch` mirror the three upstream
/// failure families; `RateLimited` marks quota exhaustion; `InvalidRequest`
/// and `Internal` are local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    InvalidRequest,
    Transport,
    Protocol,
    SchemaMismatch,
    RateLimited,
    Internal,
}

/// Structured source error carried by truncated fetch outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Transport,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Protocol,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::SchemaMismatch,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Protocol => "source.protocol",
            SourceErrorKind::SchemaMismatch => "source.schema_mismatch",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Closed-range historical fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalRequest {
    pub symbol: Symbol,
    pub interval: Interval,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl HistoricalRequest {
    pub fn new(
        symbol: Symbol,
        interval: Interval,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Result<Self, SourceError> {
        if start > end {
            return Err(SourceError::invalid_request(
                "historical request start must not be after end",
            ));
        }
        Ok(Self {
            symbol,
            interval,
            start,
            end,
        })
    }
}

/// Trailing-count recent fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentRequest {
    pub symbol: Symbol,
    pub interval: Interval,
    pub limit: usize,
}

impl RecentRequest {
    pub fn new(symbol: Symbol, interval: Interval, limit: usize) -> Result<Self, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request(
                "recent request limit must be greater than zero",
            ));
        }
        Ok(Self {
            symbol,
            interval,
            limit,
        })
    }
}

/// Whether a fetch covered everything it was asked for.
///
/// "No data exists" and "an upstream error cut the fetch short" are distinct
/// states: an empty complete series means the provider had nothing in range,
/// while `Truncated` carries the error that stopped pagination.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Complete,
    Truncated(SourceError),
}

/// Series plus completion state returned by every facade operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub series: CandleSeries,
    pub completion: Completion,
}

impl FetchOutcome {
    pub fn complete(series: CandleSeries) -> Self {
        Self {
            series,
            completion: Completion::Complete,
        }
    }

    pub fn truncated(series: CandleSeries, error: SourceError) -> Self {
        Self {
            series,
            completion: Completion::Truncated(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.completion, Completion::Complete)
    }

    pub fn truncation(&self) -> Option<&SourceError> {
        match &self.completion {
            Completion::Complete => None,
            Completion::Truncated(error) => Some(error),
        }
    }
}

/// Provider facade contract.
///
/// All four upstream providers implement this trait; callers pick a provider
/// without changing call shape. Implementations are stateless apart from
/// read-only lookup tables and must be `Send + Sync` so they can be shared
/// behind an `Arc`.
///
/// Upstream failures never surface as `Err`: transport, protocol, and schema
/// errors are converted into a (possibly empty) series with
/// [`Completion::Truncated`]. The only `Err` returns are request-validation
/// failures caught before any network call.
pub trait CandleSource: Send + Sync {
    /// Unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Canonical intervals this provider can serve, natively or by
    /// aggregation. Requests outside this set degrade to the provider
    /// default rather than failing.
    fn supported_intervals(&self) -> &'static [Interval];

    /// Fetch a closed time range, paginating until covered or the provider
    /// signals exhaustion or error.
    fn fetch_historical<'a>(
        &'a self,
        req: HistoricalRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>>;

    /// Fetch the trailing `limit` candles.
    fn fetch_recent<'a>(
        &'a self,
        req: RecentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>>;
}
