//! CoinGecko market-chart facade.
//!
//! Serves close prices and volumes only, keyed by coin id rather than
//! ticker, and picks its own sampling density server-side. Both operations
//! are single bulk calls; the normalizer's bucket snap collapses whatever
//! density comes back onto the requested interval grid, and each surviving
//! point becomes a degenerate candle with open = high = low = close.

use std::collections::BTreeMap;
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
use crate::{CandleSeries, Interval, ProviderId};

const BASE_URL: &str = "https://api.coingecko.com";

/// Curated ticker to coin-id instrument table.
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("LTC", "litecoin"),
];

const TRANSLATION: SymbolTranslation = SymbolTranslation::TableLookup {
    table: COIN_IDS,
    fallback: "bitcoin",
};

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

pub struct CoingeckoSource {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
}

impl CoingeckoSource {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, url: String) -> HttpRequest {
        let mut request = HttpRequest::get(url);
        if let Some(key) = &self.api_key {
            request = request.with_header("x-cg-demo-api-key", key);
        }
        request
    }

    async fn fetch_chart(&self, url: String) -> Result<Vec<RawCandle>, SourceError> {
        let response = execute_provider_request(self.http_client.as_ref(), self.request(url)).await?;
        parse_market_chart(&response.body)
    }
}

impl Default for CoingeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSource for CoingeckoSource {
    fn id(&self) -> ProviderId {
        ProviderId::Coingecko
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        &Interval::ALL
    }

    fn fetch_historical<'a>(
        &'a self,
        req: HistoricalRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let coin_id = TRANSLATION.translate(&req.symbol);
            let start_ts = req.start.unix_timestamp();
            let end_ts = req.end.unix_timestamp();
            let url = format!(
                "{BASE_URL}/api/v3/coins/{coin_id}/market_chart/range?vs_currency=usd&from={start_ts}&to={end_ts}",
            );

            match self.fetch_chart(url).await {
                Ok(records) => {
                    let candles = normalize(
                        records,
                        Some((start_ts, end_ts)),
                        Some(req.interval.secs()),
                    );
                    let series = CandleSeries::new(req.symbol, coin_id, req.interval, candles);
                    Ok(FetchOutcome::complete(series))
                }
                Err(error) => {
                    let series = CandleSeries::empty(req.symbol, coin_id, req.interval);
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
            let coin_id = TRANSLATION.translate(&req.symbol);
            let span_secs = req.interval.secs() * req.limit as i64;
            let days = (span_secs + 86_399) / 86_400;
            let url = format!(
                "{BASE_URL}/api/v3/coins/{coin_id}/market_chart?vs_currency=usd&days={}",
                days.max(1),
            );

            match self.fetch_chart(url).await {
                Ok(records) => {
                    let mut candles = normalize(records, None, Some(req.interval.secs()));
                    if candles.len() > req.limit {
                        let excess = candles.len() - req.limit;
                        candles.drain(..excess);
                    }
                    let series = CandleSeries::new(req.symbol, coin_id, req.interval, candles);
                    Ok(FetchOutcome::complete(series))
                }
                Err(error) => {
                    let series = CandleSeries::empty(req.symbol, coin_id, req.interval);
                    Ok(FetchOutcome::truncated(series, error))
                }
            }
        })
    }
}

fn parse_market_chart(body: &str) -> Result<Vec<RawCandle>, SourceError> {
    if let Ok(api_error) = serde_json::from_str::<ApiErrorBody>(body) {
        return Err(SourceError::protocol(format!(
            "coingecko error: {}",
            api_error.error
        )));
    }

    let chart: MarketChart = serde_json::from_str(body).map_err(|e| {
        SourceError::schema_mismatch(format!("unparseable market chart payload: {e}"))
    })?;

    // Volumes arrive as a parallel series keyed by the same millisecond
    // timestamps as prices.
    let volumes: BTreeMap<i64, f64> = chart
        .total_volumes
        .into_iter()
        .map(|(ts_ms, volume)| (ts_ms as i64 / 1_000, volume))
        .collect();

    Ok(chart
        .prices
        .into_iter()
        .map(|(ts_ms, price)| {
            let ts = ts_ms as i64 / 1_000;
            RawCandle::close_only(ts, price, volumes.get(&ts).copied())
        })
        .collect())
}
