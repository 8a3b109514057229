//! CryptoCompare histo endpoints facade.
//!
//! The histo family exposes minute, hour, and day granularities with a
//! server-side `aggregate` multiplier, so every canonical interval maps to
//! an exact native granularity. Pages are bounded by `toTs` (epoch seconds)
//! and capped at 2000 points; an error is reported in-band as
//! `{"Response":"Error","Message":...}` with HTTP 200.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::execute_provider_request;
use crate::candle_source::{
    CandleSource, FetchOutcome, HistoricalRequest, RecentRequest, SourceError,
};
use crate::granularity::{fit, GranularityUnit, NativeGranularity};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::normalize::{normalize, RawCandle};
use crate::pacing::{Pacer, PacingPolicy};
use crate::paging::{fetch_range, PageSpec};
use crate::translate::base_asset;
use crate::{CandleSeries, Interval, ProviderId};

const BASE_URL: &str = "https://min-api.cryptocompare.com";
const PAGE_CAP: usize = 2_000;
const UNITS: [GranularityUnit; 3] = [
    GranularityUnit::Minute,
    GranularityUnit::Hour,
    GranularityUnit::Day,
];
const DEFAULT_GRANULARITY: NativeGranularity = NativeGranularity::of(GranularityUnit::Day, 1);

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: Vec<HistoPoint>,
}

#[derive(Debug, Deserialize)]
struct HistoPoint {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volumefrom: f64,
}

pub struct CryptocompareSource {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    pacer: Pacer,
}

impl CryptocompareSource {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_key: None,
            pacer: Pacer::from_policy(&PacingPolicy::cryptocompare_default()),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, url: String) -> HttpRequest {
        let mut request = HttpRequest::get(url);
        if let Some(key) = &self.api_key {
            request = request.with_header("authorization", format!("Apikey {key}"));
        }
        request
    }

    async fn fetch_histo_page(&self, url: String) -> Result<Vec<RawCandle>, SourceError> {
        let response = execute_provider_request(self.http_client.as_ref(), self.request(url)).await?;
        parse_histo(&response.body)
    }
}

impl Default for CryptocompareSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleSource for CryptocompareSource {
    fn id(&self) -> ProviderId {
        ProviderId::Cryptocompare
    }

    fn supported_intervals(&self) -> &'static [Interval] {
        &Interval::ALL
    }

    fn fetch_historical<'a>(
        &'a self,
        req: HistoricalRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let base = base_asset(&req.symbol);
            let native = fit(req.interval, &UNITS, DEFAULT_GRANULARITY);
            let step = native.step_secs();
            let start_ts = req.start.unix_timestamp();
            let end_ts = req.end.unix_timestamp();
            let spec = PageSpec::new(start_ts, end_ts, PAGE_CAP);

            let paged = fetch_range(spec, &self.pacer, |cursor| {
                // toTs bounds the page from above; a page never reaches past
                // the requested end.
                let to_ts = end_ts.min(cursor + PAGE_CAP as i64 * step);
                let url = histo_url(&base, native, PAGE_CAP, Some(to_ts));
                self.fetch_histo_page(url)
            })
            .await;

            let (records, completion) = paged.into_parts();
            let candles = normalize(records, Some((start_ts, end_ts)), None);
            let series = CandleSeries::new(req.symbol, base, req.interval, candles);
            Ok(FetchOutcome { series, completion })
        })
    }

    fn fetch_recent<'a>(
        &'a self,
        req: RecentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let base = base_asset(&req.symbol);
            let native = fit(req.interval, &UNITS, DEFAULT_GRANULARITY);
            let url = histo_url(&base, native, req.limit.min(PAGE_CAP), None);

            match self.fetch_histo_page(url).await {
                Ok(records) => {
                    let mut candles = normalize(records, None, None);
                    // histo endpoints return limit+1 points; keep the
                    // trailing window the caller asked for
                    if candles.len() > req.limit {
                        let excess = candles.len() - req.limit;
                        candles.drain(..excess);
                    }
                    let series = CandleSeries::new(req.symbol, base, req.interval, candles);
                    Ok(FetchOutcome::complete(series))
                }
                Err(error) => {
                    let series = CandleSeries::empty(req.symbol, base, req.interval);
                    Ok(FetchOutcome::truncated(series, error))
                }
            }
        })
    }
}

fn histo_url(base: &str, native: NativeGranularity, limit: usize, to_ts: Option<i64>) -> String {
    let mut url = format!(
        "{BASE_URL}/data/histo{}?fsym={}&tsym=USD&limit={limit}",
        native.unit.as_str(),
        urlencoding::encode(base),
    );
    if native.aggregate > 1 {
        url.push_str(&format!("&aggregate={}", native.aggregate));
    }
    if let Some(to_ts) = to_ts {
        url.push_str(&format!("&toTs={to_ts}"));
    }
    url
}

fn parse_histo(body: &str) -> Result<Vec<RawCandle>, SourceError> {
    let payload: HistoResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::schema_mismatch(format!("unparseable histo payload: {e}")))?;

    if payload.response.as_deref() == Some("Error") {
        let message = payload
            .message
            .unwrap_or_else(|| "unspecified upstream error".to_owned());
        return Err(SourceError::protocol(format!(
            "cryptocompare error: {message}"
        )));
    }

    Ok(payload
        .data
        .into_iter()
        .map(|point| {
            RawCandle::full(
                point.time,
                point.open,
                point.high,
                point.low,
                point.close,
                point.volumefrom,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::support::RecordingHttpClient;
    use crate::candle_source::SourceErrorKind;
    use crate::{Symbol, UtcDateTime};

    fn historical(interval: Interval, start: &str, end: &str) -> HistoricalRequest {
        HistoricalRequest::new(
            Symbol::parse("BTCUSDT").expect("valid symbol"),
            interval,
            UtcDateTime::parse(start).expect("valid start"),
            UtcDateTime::parse(end).expect("valid end"),
        )
        .expect("valid request")
    }

    fn histo_body(start: i64, step: i64, count: usize) -> String {
        let points: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"time":{},"open":100.0,"high":101.0,"low":99.0,"close":100.5,"volumefrom":3.2}}"#,
                    start + step * i as i64
                )
            })
            .collect();
        format!(r#"{{"Response":"Success","Data":[{}]}}"#, points.join(","))
    }

    #[tokio::test(start_paused = true)]
    async fn fifteen_minute_interval_maps_to_aggregated_minutes() {
        let client = Arc::new(RecordingHttpClient::serving_json(&[&histo_body(
            1_704_067_200,
            900,
            4,
        )]));
        let source = CryptocompareSource::with_http_client(client.clone());

        let outcome = source
            .fetch_historical(historical(
                Interval::FifteenMinutes,
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
            ))
            .await
            .expect("validated request");

        assert_eq!(client.calls(), 1);
        assert!(outcome.is_complete());
        assert_eq!(outcome.series.len(), 4);
        assert_eq!(outcome.series.provider_symbol, "BTC");

        let urls = client.request_urls();
        assert!(urls[0].contains("/data/histominute?"));
        assert!(urls[0].contains("fsym=BTC"));
        assert!(urls[0].contains("tsym=USD"));
        assert!(urls[0].contains("aggregate=15"));
        // toTs clamps to the requested end, not cursor + cap * step
        assert!(urls[0].contains("toTs=1704070800"));
    }

    #[tokio::test(start_paused = true)]
    async fn daily_interval_uses_histoday_without_aggregate() {
        let client = Arc::new(RecordingHttpClient::serving_json(&[&histo_body(
            1_704_067_200,
            86_400,
            2,
        )]));
        let source = CryptocompareSource::with_http_client(client.clone());

        let _ = source
            .fetch_historical(historical(
                Interval::OneDay,
                "2024-01-01T00:00:00Z",
                "2024-01-03T00:00:00Z",
            ))
            .await;

        let urls = client.request_urls();
        assert!(urls[0].contains("/data/histoday?"));
        assert!(!urls[0].contains("aggregate="));
    }

    #[tokio::test(start_paused = true)]
    async fn in_band_error_truncates_the_fetch() {
        let body = r#"{"Response":"Error","Message":"limit is larger than max value."}"#;
        let client = Arc::new(RecordingHttpClient::serving_json(&[body]));
        let source = CryptocompareSource::with_http_client(client);

        let outcome = source
            .fetch_historical(historical(
                Interval::OneHour,
                "2024-01-01T00:00:00Z",
                "2024-01-02T00:00:00Z",
            ))
            .await
            .expect("validated request");

        assert!(outcome.series.is_empty());
        let error = outcome.truncation().expect("must be truncated");
        assert_eq!(error.kind(), SourceErrorKind::Protocol);
        assert!(error.message().contains("limit is larger"));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_keeps_only_the_trailing_window() {
        // histo endpoints return limit+1 points
        let client = Arc::new(RecordingHttpClient::serving_json(&[&histo_body(
            1_704_067_200,
            3_600,
            6,
        )]));
        let source = CryptocompareSource::with_http_client(client.clone());

        let outcome = source
            .fetch_recent(
                RecentRequest::new(
                    Symbol::parse("ETH").expect("valid symbol"),
                    Interval::OneHour,
                    5,
                )
                .expect("valid request"),
            )
            .await
            .expect("validated request");

        assert_eq!(outcome.series.len(), 5);
        // the oldest surplus point is the one dropped
        assert_eq!(
            outcome.series.candles[0].ts.unix_timestamp(),
            1_704_070_800
        );
        assert!(client.request_urls()[0].contains("limit=5"));
        assert!(!client.request_urls()[0].contains("toTs="));
    }

    #[tokio::test(start_paused = true)]
    async fn api_key_travels_as_apikey_header() {
        let client = Arc::new(RecordingHttpClient::serving_json(&[
            r#"{"Response":"Success","Data":[]}"#,
        ]));
        let source = CryptocompareSource::with_http_client(client.clone()).with_api_key("cc-key");

        let _ = source
            .fetch_recent(
                RecentRequest::new(
                    Symbol::parse("BTC").expect("valid symbol"),
                    Interval::OneDay,
                    1,
                )
                .expect("valid request"),
            )
            .await;

        assert_eq!(
            client.request_header(0, "authorization"),
            Some("Apikey cc-key".to_owned())
        );
    }
}
