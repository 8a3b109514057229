//! Yahoo Finance chart facade.
//!
//! The v8 chart endpoint serves a whole requested window in one response,
//! as parallel per-field arrays with null holes where the exchange printed
//! no trade. 2h and 4h have no native interval string, so they degrade to
//! hourly samples snapped onto the requested grid.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::execute_provider_request;
use crate::candle_source::{
    CandleSource, FetchOutcome, HistoricalRequest, RecentRequest, SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::normalize::{normalize, RawCandle};
use crate::translate::SymbolTranslation;
use crate::{CandleSeries, Interval, ProviderId, UtcDateTime};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const TRANSLATION: SymbolTranslation = SymbolTranslation::SuffixRewrite { append: "-USD" };

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartOutcome,
}

#[derive(Debug, Deserialize)]
struct ChartOutcome {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooSource {
    http_client: Arc<dyn HttpClient>,
}

impl YahooSource {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    async fn fetch_chart(
        &self,
        provider_symbol: &str,
        native: &str,
        period1: i64,
        period2: i64,
    ) -> Result<Vec<RawCandle>, SourceError> {
        let url = format!(
            "{BASE_URL}/v8/finance/chart/{}?period1={period1}&period2={period2}&interval={native}",
            urlencoding::encode(provider_symbol),
        );
        let response =
            execute_provider_request(self.http_client.as_ref(), HttpRequest::get(url)).await?;
        parse_chart(&response.body)
    }
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSource for YahooSource {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        &Interval::ALL
    }

    fn fetch_historical<'a>(
        &'a self,
        req: HistoricalRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let provider_symbol = TRANSLATION.translate(&req.symbol);
            let (native, snapped) = native_interval(req.interval);
            let start_ts = req.start.unix_timestamp();
            let end_ts = req.end.unix_timestamp();
            let bucket = snapped.then(|| req.interval.secs());

            match self
                .fetch_chart(&provider_symbol, native, start_ts, end_ts)
                .await
            {
                Ok(records) => {
                    let candles = normalize(records, Some((start_ts, end_ts)), bucket);
                    let series =
                        CandleSeries::new(req.symbol, provider_symbol, req.interval, candles);
                    Ok(FetchOutcome::complete(series))
                }
                Err(error) => {
                    let series = CandleSeries::empty(req.symbol, provider_symbol, req.interval);
                    Ok(FetchOutcome::truncated(series, error))
                }
            }
        })
    }

    fn fetch_recent<'a>(
        &'a self,
        req: RecentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let provider_symbol = TRANSLATION.translate(&req.symbol);
            let (native, snapped) = native_interval(req.interval);
            let bucket = snapped.then(|| req.interval.secs());
            let end_ts = UtcDateTime::now().unix_timestamp();
            let start_ts = end_ts - req.interval.secs() * req.limit as i64;

            match self
                .fetch_chart(&provider_symbol, native, start_ts, end_ts)
                .await
            {
                Ok(records) => {
                    let mut candles = normalize(records, None, bucket);
                    if candles.len() > req.limit {
                        let excess = candles.len() - req.limit;
                        candles.drain(..excess);
                    }
                    let series =
                        CandleSeries::new(req.symbol, provider_symbol, req.interval, candles);
                    Ok(FetchOutcome::complete(series))
                }
                Err(error) => {
                    let series = CandleSeries::empty(req.symbol, provider_symbol, req.interval);
                    Ok(FetchOutcome::truncated(series, error))
                }
            }
        })
    }
}

/// Map a canonical interval onto Yahoo's interval strings. The second field
/// marks intervals served at finer granularity that need bucket snapping.
fn native_interval(interval: Interval) -> (&'static str, bool) {
    match interval {
        Interval::OneMinute => ("1m", false),
        Interval::FiveMinutes => ("5m", false),
        Interval::FifteenMinutes => ("15m", false),
        Interval::ThirtyMinutes => ("30m", false),
        Interval::OneHour => ("60m", false),
        Interval::TwoHours => ("60m", true),
        Interval::FourHours => ("60m", true),
        Interval::OneDay => ("1d", false),
    }
}

fn parse_chart(body: &str) -> Result<Vec<RawCandle>, SourceError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| SourceError::schema_mismatch(format!("unparseable chart payload: {e}")))?;

    if let Some(error) = envelope.chart.error {
        return Err(SourceError::protocol(format!(
            "yahoo chart error {}: {}",
            error.code, error.description
        )));
    }

    let result = match envelope.chart.result.and_then(|mut r| {
        if r.is_empty() {
            None
        } else {
            Some(r.remove(0))
        }
    }) {
        Some(result) => result,
        None => return Ok(Vec::new()),
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut records = Vec::with_capacity(result.timestamp.len());
    for (index, &ts) in result.timestamp.iter().enumerate() {
        // a null close means no trade printed in that bucket
        let close = match quote.close.get(index).copied().flatten() {
            Some(close) => close,
            None => continue,
        };
        let volume = quote.volume.get(index).copied().flatten();

        let record = match (
            quote.open.get(index).copied().flatten(),
            quote.high.get(index).copied().flatten(),
            quote.low.get(index).copied().flatten(),
        ) {
            (Some(open), Some(high), Some(low)) => {
                RawCandle::full(ts, open, high, low, close, volume.unwrap_or(0.0))
            }
            _ => RawCandle::close_only(ts, close, volume),
        };
        records.push(record);
    }

    Ok(records)
}
