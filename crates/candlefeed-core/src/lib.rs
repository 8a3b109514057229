//! Core contracts for candlefeed.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Symbol translation and interval-to-granularity mapping
//! - The paginated acquisition loop with inter-page pacing
//! - Response normalization into clean candle series
//! - Provider facades and the source registry

pub mod adapters;
pub mod candle_source;
pub mod domain;
pub mod error;
pub mod granularity;
pub mod http_client;
pub mod normalize;
pub mod pacing;
pub mod paging;
pub mod registry;
pub mod source;
pub mod translate;

pub use adapters::{BinanceSource, CoingeckoSource, CryptocompareSource, YahooSource};
pub use candle_source::{
    CandleSource, Completion, FetchOutcome, HistoricalRequest, RecentRequest, SourceError,
    SourceErrorKind,
};
pub use domain::{Candle, CandleSeries, Interval, Symbol, UtcDateTime};
pub use error::{CoreError, ValidationError};
pub use granularity::{GranularityUnit, NativeGranularity};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient};
pub use normalize::RawCandle;
pub use pacing::{Pacer, PacingPolicy};
pub use paging::{PageSpec, PagedRecords, StopReason};
pub use registry::{SourceRegistry, SourceRegistryBuilder};
pub use source::ProviderId;
pub use translate::SymbolTranslation;
