//! Provider facade implementations.
//!
//! One module per upstream. Each facade owns its symbol translation,
//! interval mapping, URL construction, and payload parsing, and delegates
//! pagination to [`crate::paging`] and record cleanup to
//! [`crate::normalize`].

use tracing::warn;

use crate::candle_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};

mod binance;
mod coingecko;
mod cryptocompare;
mod yahoo;

pub use binance::BinanceSource;
pub use coingecko::CoingeckoSource;
pub use cryptocompare::CryptocompareSource;
pub use yahoo::YahooSource;

/// Execute one provider request and classify failures.
///
/// Transport failures map to retryable `Transport`, HTTP 429 to
/// `RateLimited`, and any other non-2xx status to `Protocol`.
pub(crate) async fn execute_provider_request(
    client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<HttpResponse, SourceError> {
    let url = request.url.clone();
    let response = client.execute(request).await.map_err(|e| {
        warn!(%url, error = e.message(), "transport failure");
        SourceError::transport(e.message())
    })?;

    if response.status == 429 {
        return Err(SourceError::rate_limited(format!(
            "upstream throttled request to {url}"
        )));
    }
    if !response.is_success() {
        return Err(SourceError::protocol(format!(
            "unexpected status {} from {url}",
            response.status
        )));
    }
    Ok(response)
}
