//! Provider registry.
//!
//! Holds one facade instance per provider behind the [`CandleSource`]
//! trait so callers select an upstream by [`ProviderId`] without naming a
//! concrete type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{BinanceSource, CoingeckoSource, CryptocompareSource, YahooSource};
use crate::candle_source::CandleSource;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::ProviderId;

pub struct SourceRegistry {
    sources: HashMap<ProviderId, Arc<dyn CandleSource>>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Arc<dyn CandleSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id(), source))
            .collect();
        Self { sources }
    }

    pub fn get(&self, provider: ProviderId) -> Option<Arc<dyn CandleSource>> {
        self.sources.get(&provider).cloned()
    }

    /// Registered providers in stable name order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.sources.keys().copied().collect();
        providers.sort_by_key(|provider| provider.as_str());
        providers
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(BinanceSource::new()),
            Arc::new(CryptocompareSource::new()),
            Arc::new(CoingeckoSource::new()),
            Arc::new(YahooSource::new()),
        ])
    }
}

/// Builder wiring a shared transport and per-provider API keys.
///
/// # Environment Variables
///
/// | Provider | Primary | Fallback |
/// |----------|---------|----------|
/// | Binance | `CANDLEFEED_BINANCE_API_KEY` | `BINANCE_API_KEY` |
/// | CryptoCompare | `CANDLEFEED_CRYPTOCOMPARE_API_KEY` | `CRYPTOCOMPARE_API_KEY` |
/// | CoinGecko | `CANDLEFEED_COINGECKO_API_KEY` | `COINGECKO_API_KEY` |
/// | Yahoo | (no key required) | - |
#[derive(Default)]
pub struct SourceRegistryBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    binance_api_key: Option<String>,
    cryptocompare_api_key: Option<String>,
    coingecko_api_key: Option<String>,
}

impl SourceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a shared transport for every provider. Defaults to
    /// [`ReqwestHttpClient`] when unset.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_binance_api_key(mut self, key: impl Into<String>) -> Self {
        self.binance_api_key = Some(key.into());
        self
    }

    pub fn with_cryptocompare_api_key(mut self, key: impl Into<String>) -> Self {
        self.cryptocompare_api_key = Some(key.into());
        self
    }

    pub fn with_coingecko_api_key(mut self, key: impl Into<String>) -> Self {
        self.coingecko_api_key = Some(key.into());
        self
    }

    /// Pick up API keys from the environment, keeping any key already set
    /// on the builder.
    pub fn from_env(mut self) -> Self {
        self.binance_api_key = self
            .binance_api_key
            .or_else(|| env_key("CANDLEFEED_BINANCE_API_KEY", "BINANCE_API_KEY"));
        self.cryptocompare_api_key = self
            .cryptocompare_api_key
            .or_else(|| env_key("CANDLEFEED_CRYPTOCOMPARE_API_KEY", "CRYPTOCOMPARE_API_KEY"));
        self.coingecko_api_key = self
            .coingecko_api_key
            .or_else(|| env_key("CANDLEFEED_COINGECKO_API_KEY", "COINGECKO_API_KEY"));
        self
    }

    pub fn build(self) -> SourceRegistry {
        let http_client: Arc<dyn HttpClient> = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));

        let mut binance = BinanceSource::with_http_client(http_client.clone());
        if let Some(key) = self.binance_api_key {
            binance = binance.with_api_key(key);
        }

        let mut cryptocompare = CryptocompareSource::with_http_client(http_client.clone());
        if let Some(key) = self.cryptocompare_api_key {
            cryptocompare = cryptocompare.with_api_key(key);
        }

        let mut coingecko = CoingeckoSource::with_http_client(http_client.clone());
        if let Some(key) = self.coingecko_api_key {
            coingecko = coingecko.with_api_key(key);
        }

        SourceRegistry::new(vec![
            Arc::new(binance),
            Arc::new(cryptocompare),
            Arc::new(coingecko),
            Arc::new(YahooSource::with_http_client(http_client)),
        ])
    }
}

fn env_key(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
        .filter(|key| !key.trim().is_empty())
}
