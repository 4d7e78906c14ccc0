use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota,
    RateLimiter as GovernorRateLimiter,
};
use serde_json::json;
use std::{net::SocketAddr, num::NonZeroU32, time::Duration};

use crate::{
    config::RateLimitSettings,
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

type KeyedLimiter = GovernorRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Refill period used when the configured rate is zero or negative.
const NO_REFILL_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Burst of `capacity` requests, then one more every `1 / refill_per_sec` seconds.
pub fn quota_for(settings: &RateLimitSettings) -> Quota {
    let burst = NonZeroU32::new(settings.capacity.max(1.0) as u32).unwrap_or(NonZeroU32::MIN);
    let period = if settings.refill_per_sec > 0.0 {
        Duration::from_secs_f64(1.0 / settings.refill_per_sec)
    } else {
        NO_REFILL_PERIOD
    };

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(burst)
}

/// Where buckets live. In-process for one instance; a shared store (e.g. Redis)
/// can implement the same contract for several instances.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// `true` if the request identified by `key` may proceed.
    async fn try_acquire(&self, key: &str) -> anyhow::Result<bool>;
}

/// Per-process keyed limiter; reset on restart.
pub struct GovernorRateLimitStore {
    limiter: KeyedLimiter,
    max_tracked_clients: usize,
}

impl GovernorRateLimitStore {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            limiter: GovernorRateLimiter::keyed(quota_for(settings)),
            max_tracked_clients: settings.max_tracked_clients.max(1),
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

#[async_trait]
impl RateLimitStore for GovernorRateLimitStore {
    async fn try_acquire(&self, key: &str) -> anyhow::Result<bool> {
        let allowed = self.limiter.check_key(&key.to_string()).is_ok();

        // Buckets that have refilled completely carry no state worth keeping.
        if self.limiter.len() > self.max_tracked_clients {
            self.limiter.retain_recent();
            self.limiter.shrink_to_fit();
        }

        Ok(allowed)
    }
}

pub struct RateLimiter {
    store: Box<dyn RateLimitStore>,
    trust_proxy: bool,
}

impl RateLimiter {
    pub fn new(store: Box<dyn RateLimitStore>, trust_proxy: bool) -> Self {
        Self { store, trust_proxy }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(Box::new(GovernorRateLimitStore::new(settings)), settings.trust_proxy)
    }

    pub async fn check(&self, key: &str) -> bool {
        match self.store.try_acquire(key).await {
            Ok(allowed) => allowed,
            Err(e) => {
                // Best-effort: an unavailable store never blocks traffic.
                tracing::warn!("rate limit store error for {}: {:#}", key, e);
                true
            }
        }
    }

    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_key(headers, peer, self.trust_proxy)
    }
}

/// The peer address, or the first `X-Forwarded-For` hop when running behind a
/// trusted proxy.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);

    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.rate_limiter.client_key(request.headers(), peer);

    if !state.rate_limiter.check(&key).await {
        LOGGER.log_security_event(
            "rate_limited",
            None,
            fields([
                ("client", json!(key)),
                ("path", json!(request.uri().path())),
            ]),
        );
        return Err(AppError::TooManyRequests(
            "Too many requests, please slow down".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
