//! Binance spot klines facade.
//!
//! Serves full OHLCV natively at every canonical interval, so no
//! aggregation or bucket snapping is needed. Pages are positional JSON
//! arrays capped at 1000 rows; prices arrive as decimal strings.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::execute_provider_request;
use crate::candle_source::{
    CandleSource, FetchOutcome, HistoricalRequest, RecentRequest, SourceError,
};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::normalize::{normalize, RawCandle};
use crate::pacing::{Pacer, PacingPolicy};
use crate::paging::{fetch_range, PageSpec};
use crate::translate::SymbolTranslation;
use crate::{CandleSeries, Interval, ProviderId};

const BASE_URL: &str = "https://api.binance.com";
const PAGE_CAP: usize = 1_000;
const TRANSLATION: SymbolTranslation = SymbolTranslation::SuffixRewrite { append: "USDT" };

/// Structured error body Binance returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i64,
    msg: String,
}

pub struct BinanceSource {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    pacer: Pacer,
}

impl BinanceSource {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_key: None,
            pacer: Pacer::from_policy(&PacingPolicy::binance_default()),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, url: String) -> HttpRequest {
        let mut request = HttpRequest::get(url);
        if let Some(key) = &self.api_key {
            request = request.with_header("X-MBX-APIKEY", key);
        }
        request
    }

    async fn fetch_klines_page(&self, url: String) -> Result<Vec<RawCandle>, SourceError> {
        let response = execute_provider_request(self.http_client.as_ref(), self.request(url)).await?;
        parse_klines(&response.body)
    }
}

impl Default for BinanceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSource for BinanceSource {
    fn id(&self) -> ProviderId {
        ProviderId::Binance
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
            let start_ts = req.start.unix_timestamp();
            let end_ts = req.end.unix_timestamp();
            let spec = PageSpec::new(start_ts, end_ts, PAGE_CAP);

            let paged = fetch_range(spec, &self.pacer, |cursor| {
                let url = format!(
                    "{BASE_URL}/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={PAGE_CAP}",
                    provider_symbol,
                    req.interval.as_str(),
                    cursor * 1_000,
                    end_ts * 1_000,
                );
                self.fetch_klines_page(url)
            })
            .await;

            let (records, completion) = paged.into_parts();
            let candles = normalize(records, Some((start_ts, end_ts)), None);
            let series = CandleSeries::new(req.symbol, provider_symbol, req.interval, candles);
            Ok(FetchOutcome { series, completion })
        })
    }

    fn fetch_recent<'a>(
        &'a self,
        req: RecentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let provider_symbol = TRANSLATION.translate(&req.symbol);
            let url = format!(
                "{BASE_URL}/api/v3/klines?symbol={}&interval={}&limit={}",
                provider_symbol,
                req.interval.as_str(),
                req.limit.min(PAGE_CAP),
            );

            match self.fetch_klines_page(url).await {
                Ok(records) => {
                    let candles = normalize(records, None, None);
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

fn parse_klines(body: &str) -> Result<Vec<RawCandle>, SourceError> {
    if let Ok(api_error) = serde_json::from_str::<BinanceApiError>(body) {
        return Err(SourceError::protocol(format!(
            "binance error {}: {}",
            api_error.code, api_error.msg
        )));
    }

    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| SourceError::schema_mismatch(format!("unparseable klines payload: {e}")))?;

    rows.iter().map(|row| parse_row(row)).collect()
}

fn parse_row(row: &[Value]) -> Result<RawCandle, SourceError> {
    let open_time_ms = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| SourceError::schema_mismatch("kline row missing open time"))?;

    let open = decimal_field(row, 1, "open")?;
    let high = decimal_field(row, 2, "high")?;
    let low = decimal_field(row, 3, "low")?;
    let close = decimal_field(row, 4, "close")?;
    let volume = decimal_field(row, 5, "volume")?;

    // Binance timestamps are epoch milliseconds.
    Ok(RawCandle::full(
        open_time_ms / 1_000,
        open,
        high,
        low,
        close,
        volume,
    ))
}

fn decimal_field(row: &[Value], index: usize, name: &str) -> Result<f64, SourceError> {
    let value = row.get(index).ok_or_else(|| {
        SourceError::schema_mismatch(format!("kline row missing {name} at index {index}"))
    })?;

    match value {
        Value::String(text) => text.parse::<f64>().map_err(|_| {
            SourceError::schema_mismatch(format!("kline {name} is not a decimal string"))
        }),
        Value::Number(number) => number.as_f64().ok_or_else(|| {
            SourceError::schema_mismatch(format!("kline {name} is not a finite number"))
        }),
        _ => Err(SourceError::schema_mismatch(format!(
            "kline {name} has unexpected type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::support::RecordingHttpClient;
    use crate::candle_source::{Completion, SourceErrorKind};
    use crate::{Symbol, UtcDateTime};

    fn historical(symbol: &str, interval: Interval, start: &str, end: &str) -> HistoricalRequest {
        HistoricalRequest::new(
            Symbol::parse(symbol).expect("valid symbol"),
            interval,
            UtcDateTime::parse(start).expect("valid start"),
            UtcDateTime::parse(end).expect("valid end"),
        )
        .expect("valid request")
    }

    fn kline_row(open_time_ms: i64, close: f64) -> String {
        // high/low bracket the close so normalization keeps every row
        let open = close - 25.0;
        let high = close + 75.0;
        let low = close - 75.0;
        format!(
            "[{open_time_ms},\"{open}\",\"{high}\",\"{low}\",\"{close}\",\"12.5\",0,\"0\",0,\"0\",\"0\",\"0\"]"
        )
    }

    fn klines_body(start_ms: i64, step_ms: i64, count: usize) -> String {
        let rows: Vec<String> = (0..count)
            .map(|i| kline_row(start_ms + step_ms * i as i64, 42_050.0 + i as f64))
            .collect();
        format!("[{}]", rows.join(","))
    }

    #[tokio::test(start_paused = true)]
    async fn hour_of_fifteen_minute_candles_in_one_call() {
        // given a single short page covering four 15m buckets
        let client = Arc::new(RecordingHttpClient::serving_json(&[&klines_body(
            1_704_067_200_000,
            900_000,
            4,
        )]));
        let source = BinanceSource::with_http_client(client.clone());

        // when fetching 2024-01-01T00:00:00Z..01:00:00Z at 15m
        let outcome = source
            .fetch_historical(historical(
                "BTC",
                Interval::FifteenMinutes,
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
            ))
            .await
            .expect("validated request");

        // then one HTTP call yields exactly four candles, 900s apart
        assert_eq!(client.calls(), 1);
        assert!(outcome.is_complete());
        assert_eq!(outcome.series.len(), 4);
        assert_eq!(outcome.series.provider_symbol, "BTCUSDT");
        for pair in outcome.series.candles.windows(2) {
            assert_eq!(
                pair[1].ts.unix_timestamp() - pair[0].ts.unix_timestamp(),
                900
            );
        }

        let urls = client.request_urls();
        assert!(urls[0].contains("symbol=BTCUSDT"));
        assert!(urls[0].contains("interval=15m"));
        assert!(urls[0].contains("startTime=1704067200000"));
        assert!(urls[0].contains("endTime=1704070800000"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_pages_chain_until_range_is_covered() {
        // given two full pages of 1m candles
        let page_one = klines_body(0, 60_000, 1_000);
        let page_two = klines_body(60_000_000, 60_000, 1_000);
        let client = Arc::new(RecordingHttpClient::serving_json(&[&page_one, &page_two]));
        let source = BinanceSource::with_http_client(client.clone());

        let outcome = source
            .fetch_historical(historical(
                "BTC",
                Interval::OneMinute,
                "1970-01-01T00:00:00Z",
                "1970-01-02T09:00:00Z",
            ))
            .await
            .expect("validated request");

        assert_eq!(client.calls(), 2);
        assert!(outcome.is_complete());
        // the second page over-returns past the requested end; the clamp
        // keeps buckets up to 09:00:00 inclusive
        assert_eq!(outcome.series.len(), 1_981);
        // second page starts one second past the last record of the first
        assert!(client.request_urls()[1].contains("startTime=59941000"));
    }

    #[tokio::test(start_paused = true)]
    async fn error_body_truncates_with_partial_result() {
        let page_one = klines_body(0, 60_000, 1_000);
        let error_body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
        let client = Arc::new(RecordingHttpClient::serving_json(&[&page_one, error_body]));
        let source = BinanceSource::with_http_client(client.clone());

        let outcome = source
            .fetch_historical(historical(
                "BTC",
                Interval::OneMinute,
                "1970-01-01T00:00:00Z",
                "1970-01-02T09:00:00Z",
            ))
            .await
            .expect("validated request");

        // the first page survives; the error is reported, not thrown
        assert_eq!(outcome.series.len(), 1_000);
        let error = outcome.truncation().expect("must be truncated");
        assert_eq!(error.kind(), SourceErrorKind::Protocol);
        assert!(error.message().contains("-1121"));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_issues_a_single_capped_call() {
        let client = Arc::new(RecordingHttpClient::serving_json(&[&klines_body(
            1_704_067_200_000,
            60_000,
            5,
        )]));
        let source = BinanceSource::with_http_client(client.clone());

        let outcome = source
            .fetch_recent(
                RecentRequest::new(
                    Symbol::parse("ETH").expect("valid symbol"),
                    Interval::OneMinute,
                    5,
                )
                .expect("valid request"),
            )
            .await
            .expect("validated request");

        assert_eq!(client.calls(), 1);
        assert_eq!(outcome.series.len(), 5);
        assert_eq!(outcome.completion, Completion::Complete);
        let urls = client.request_urls();
        assert!(urls[0].contains("symbol=ETHUSDT"));
        assert!(urls[0].contains("limit=5"));
        assert!(!urls[0].contains("startTime"));
    }

    #[tokio::test(start_paused = true)]
    async fn api_key_travels_as_mbx_header() {
        let client = Arc::new(RecordingHttpClient::serving_json(&["[]"]));
        let source = BinanceSource::with_http_client(client.clone()).with_api_key("demo-key");

        let _ = source
            .fetch_recent(
                RecentRequest::new(
                    Symbol::parse("BTC").expect("valid symbol"),
                    Interval::OneHour,
                    1,
                )
                .expect("valid request"),
            )
            .await;

        assert_eq!(
            client.request_header(0, "x-mbx-apikey"),
            Some("demo-key".to_owned())
        );
    }

    #[test]
    fn rejects_rows_with_malformed_prices() {
        let err = parse_klines(r#"[[1704067200000,"not-a-number","1","1","1","1"]]"#)
            .expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::SchemaMismatch);
    }
}
