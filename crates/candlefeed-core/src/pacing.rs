//! Inter-page rate pacing.
//!
//! Upstream free tiers tolerate a short gap between pagination requests. The
//! pacer combines a fixed minimum page gap with a per-provider token bucket:
//! while quota is available a page waits only the minimum gap, and once the
//! bucket is drained the wait stretches to the bucket refill period.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::ProviderId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-provider pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub provider_id: ProviderId,
    /// Floor applied between consecutive pages even when quota is available.
    pub min_page_gap: Duration,
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl PacingPolicy {
    /// Binance spot API: generous request weight budget.
    pub const fn binance_default() -> Self {
        Self {
            provider_id: ProviderId::Binance,
            min_page_gap: Duration::from_millis(150),
            quota_window: Duration::from_secs(60),
            quota_limit: 1_100,
        }
    }

    /// CryptoCompare free tier: roughly 100k calls/month, burst-sensitive.
    pub const fn cryptocompare_default() -> Self {
        Self {
            provider_id: ProviderId::Cryptocompare,
            min_page_gap: Duration::from_millis(150),
            quota_window: Duration::from_secs(60),
            quota_limit: 50,
        }
    }

    /// CoinGecko free tier: 10-30 calls/minute depending on load.
    pub const fn coingecko_default() -> Self {
        Self {
            provider_id: ProviderId::Coingecko,
            min_page_gap: Duration::from_millis(200),
            quota_window: Duration::from_secs(60),
            quota_limit: 10,
        }
    }

    /// Yahoo chart endpoint: unauthenticated, keep well under the radar.
    pub const fn yahoo_default() -> Self {
        Self {
            provider_id: ProviderId::Yahoo,
            min_page_gap: Duration::from_millis(200),
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
        }
    }

    pub const fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Binance => Self::binance_default(),
            ProviderId::Cryptocompare => Self::cryptocompare_default(),
            ProviderId::Coingecko => Self::coingecko_default(),
            ProviderId::Yahoo => Self::yahoo_default(),
        }
    }
}

/// Token-bucket pacer shared by all calls through one facade.
#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
    min_page_gap: Duration,
    refill_period: Duration,
}

impl Pacer {
    pub fn from_policy(policy: &PacingPolicy) -> Self {
        let refill_period = refill_period(policy.quota_window, policy.quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota(
                refill_period,
                policy.quota_limit,
            ))),
            min_page_gap: policy.min_page_gap,
            refill_period,
        }
    }

    /// Delay to wait before issuing the next page request.
    pub fn next_delay(&self) -> Duration {
        if self.limiter.check().is_ok() {
            self.min_page_gap
        } else {
            self.refill_period.max(self.min_page_gap)
        }
    }

    /// Sleep the recommended delay. Called between pages, never before the
    /// first one.
    pub async fn pause(&self) {
        tokio::time::sleep(self.next_delay()).await;
    }
}

fn refill_period(quota_window: Duration, quota_limit: u32) -> Duration {
    let safe_limit = quota_limit.max(1);
    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    Duration::from_secs_f64(seconds_per_cell)
}

fn quota(refill_period: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit.max(1)).expect("safe limit must be non-zero");
    Quota::with_period(refill_period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
