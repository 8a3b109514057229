//! Uniform facade contract checks across every provider.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use candlefeed_core::{
    BinanceSource, CandleSource, CoingeckoSource, CryptocompareSource, HistoricalRequest,
    HttpClient, HttpError, HttpRequest, HttpResponse, Interval, ProviderId, RecentRequest,
    SourceErrorKind, SourceRegistry, Symbol, UtcDateTime, YahooSource,
};

/// Serves queued responses in order and counts calls.
struct ScriptedHttpClient {
    responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
    calls: AtomicUsize,
}

impl ScriptedHttpClient {
    fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        })
    }

    fn serving(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(HttpResponse::ok_json(body))])
    }

    fn failing() -> Arc<Self> {
        Self::new(vec![Err(HttpError::new("connection refused"))])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut responses = self.responses.lock().expect("response script");
            if responses.is_empty() {
                Err(HttpError::new("script exhausted"))
            } else {
                responses.remove(0)
            }
        };
        Box::pin(async move { next })
    }
}

fn empty_body(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Binance => "[]",
        ProviderId::Cryptocompare => r#"{"Response":"Success","Data":[]}"#,
        ProviderId::Coingecko => r#"{"prices":[],"market_caps":[],"total_volumes":[]}"#,
        ProviderId::Yahoo => {
            r#"{"chart":{"result":[{"timestamp":[],"indicators":{"quote":[{}]}}],"error":null}}"#
        }
    }
}

fn source_for(
    provider: ProviderId,
    client: Arc<ScriptedHttpClient>,
) -> Arc<dyn CandleSource> {
    match provider {
        ProviderId::Binance => Arc::new(BinanceSource::with_http_client(client)),
        ProviderId::Cryptocompare => Arc::new(CryptocompareSource::with_http_client(client)),
        ProviderId::Coingecko => Arc::new(CoingeckoSource::with_http_client(client)),
        ProviderId::Yahoo => Arc::new(YahooSource::with_http_client(client)),
    }
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

fn window(start: &str, end: &str) -> (UtcDateTime, UtcDateTime) {
    (
        UtcDateTime::parse(start).expect("valid start"),
        UtcDateTime::parse(end).expect("valid end"),
    )
}

#[tokio::test]
async fn every_provider_reports_its_own_id() {
    for provider in ProviderId::ALL {
        let source = source_for(provider, ScriptedHttpClient::serving("{}"));
        assert_eq!(source.id(), provider);
        assert!(!source.supported_intervals().is_empty());
        assert!(source.supported_intervals().contains(&Interval::OneDay));
    }
}

#[tokio::test]
async fn inverted_range_fails_before_any_network_call() {
    let (end, start) = window("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");
    let err = HistoricalRequest::new(symbol("BTC"), Interval::OneHour, start, end)
        .expect_err("inverted range must fail");
    assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
}

#[tokio::test]
async fn zero_limit_recent_fails_before_any_network_call() {
    let err = RecentRequest::new(symbol("BTC"), Interval::OneHour, 0)
        .expect_err("zero limit must fail");
    assert_eq!(err.kind(), SourceErrorKind::InvalidRequest);
}

#[tokio::test]
async fn unknown_symbol_yields_an_empty_series_not_an_error() {
    let (start, end) = window("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");

    for provider in ProviderId::ALL {
        let client = ScriptedHttpClient::serving(empty_body(provider));
        let source = source_for(provider, client);

        let request =
            HistoricalRequest::new(symbol("ZZZZZ"), Interval::OneDay, start, end)
                .expect("valid request");
        let outcome = source
            .fetch_historical(request)
            .await
            .expect("unknown symbols never raise");

        assert!(outcome.series.is_empty(), "provider {provider}");
        assert!(outcome.is_complete(), "provider {provider}");
    }
}

#[tokio::test]
async fn transport_failure_surfaces_as_truncation_not_err() {
    let (start, end) = window("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");

    for provider in ProviderId::ALL {
        let client = ScriptedHttpClient::failing();
        let source = source_for(provider, client.clone());

        let request =
            HistoricalRequest::new(symbol("BTC"), Interval::OneDay, start, end)
                .expect("valid request");
        let outcome = source
            .fetch_historical(request)
            .await
            .expect("transport failures never raise");

        assert_eq!(client.calls(), 1, "provider {provider}");
        assert!(outcome.series.is_empty(), "provider {provider}");
        let error = outcome.truncation().expect("must be truncated");
        assert_eq!(error.kind(), SourceErrorKind::Transport);
        assert!(error.retryable());
    }
}

#[tokio::test]
async fn recent_transport_failure_also_truncates() {
    for provider in ProviderId::ALL {
        let client = ScriptedHttpClient::failing();
        let source = source_for(provider, client);

        let request =
            RecentRequest::new(symbol("ETH"), Interval::OneHour, 24).expect("valid request");
        let outcome = source
            .fetch_recent(request)
            .await
            .expect("transport failures never raise");

        assert!(outcome.series.is_empty(), "provider {provider}");
        assert!(outcome.truncation().is_some(), "provider {provider}");
    }
}

#[tokio::test]
async fn default_registry_serves_every_provider() {
    let registry = SourceRegistry::default();

    assert_eq!(registry.len(), ProviderId::ALL.len());
    for provider in ProviderId::ALL {
        let source = registry.get(provider).expect("registered");
        assert_eq!(source.id(), provider);
    }
}
