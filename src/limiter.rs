//! Tiered sliding-window rate limiting keyed by client address.
//!
//! Three independent tiers: a global tier covering everything except the health
//! probe and the document root, plus stricter tiers layered on the AI and
//! downloader route groups. The bucket store is owned by the [`RateLimiter`] and
//! injected into the router at construction, so a distributed store could replace
//! it without touching call sites.

use crate::config::{Config, TierLimit};
use crate::error::ApiError;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Named rate-limiting policy, each with its own window and ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Loose tier applied to every route except the skip list.
    Global,
    /// Tightest tier: AI relay calls consume the caller's upstream quota.
    Ai,
    /// Moderate tier for the file-mirror resolvers.
    Downloader,
}

impl Tier {
    /// Fixed message returned when this tier rejects a request.
    pub fn message(self) -> &'static str {
        match self {
            Self::Global => "Too many requests from this IP, please try again later.",
            Self::Ai => "Too many AI requests, please try again later.",
            Self::Downloader => "Too many download requests, please try again later.",
        }
    }
}

/// Counter state for one (tier, address) pair within the current window.
#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

/// Bucket map plus the timestamp of the last expiry sweep.
#[derive(Debug)]
struct BucketStore {
    buckets: HashMap<(Tier, IpAddr), Bucket>,
    last_sweep: Instant,
}

/// Sliding-window counters for all tiers, shared across concurrent requests.
///
/// The increment-then-compare in [`RateLimiter::check`] happens under the bucket
/// lock, so interleaved requests from the same address never lose updates.
/// Expired buckets are swept from the store at most once per shortest tier
/// window, keeping the map bounded by currently active clients.
#[derive(Debug)]
pub struct RateLimiter {
    global: TierLimit,
    ai: TierLimit,
    downloader: TierLimit,
    sweep_interval: Duration,
    store: Mutex<BucketStore>,
}

impl RateLimiter {
    /// Build a limiter with explicit tier policies.
    pub fn new(global: TierLimit, ai: TierLimit, downloader: TierLimit) -> Self {
        Self {
            global,
            ai,
            downloader,
            sweep_interval: global.window.min(ai.window).min(downloader.window),
            store: Mutex::new(BucketStore {
                buckets: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Build a limiter from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.global_limit, config.ai_limit, config.downloader_limit)
    }

    fn limit(&self, tier: Tier) -> TierLimit {
        match tier {
            Tier::Global => self.global,
            Tier::Ai => self.ai,
            Tier::Downloader => self.downloader,
        }
    }

    /// Count one request against the tier's bucket for `addr`.
    ///
    /// Buckets are created lazily and reset in place once their window elapses.
    /// Returns a 429 [`ApiError`] when the ceiling is exceeded.
    pub fn check(&self, tier: Tier, addr: IpAddr) -> Result<(), ApiError> {
        let limit = self.limit(tier);
        let now = Instant::now();
        let mut store = self.store.lock().expect("limiter lock poisoned");

        if now.duration_since(store.last_sweep) >= self.sweep_interval {
            let (global, ai, downloader) = (self.global, self.ai, self.downloader);
            store.buckets.retain(|(tier, _), bucket| {
                let window = match tier {
                    Tier::Global => global.window,
                    Tier::Ai => ai.window,
                    Tier::Downloader => downloader.window,
                };
                now.duration_since(bucket.window_start) <= window
            });
            store.last_sweep = now;
        }

        let bucket = store.buckets.entry((tier, addr)).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) > limit.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        bucket.count += 1;
        if bucket.count > limit.max {
            tracing::warn!(tier = ?tier, client = %addr, "Rate limit exceeded");
            return Err(ApiError::too_many_requests(tier.message()));
        }
        Ok(())
    }
}

/// Routes never counted against the global tier, so orchestration probes and the
/// front-end document are never starved.
fn skips_global_tier(path: &str) -> bool {
    path == "/health" || path == "/"
}

/// Resolve the client address for bucketing.
///
/// Keys on the socket peer address. The `x-forwarded-for` header is spoofable
/// by direct clients, so it is honored only when the deployment declares a
/// trusted reverse proxy in front of the gateway.
fn client_addr(request: &Request, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(forwarded) = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|value| value.trim().parse().ok())
        {
            return forwarded;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Axum middleware enforcing one tier; layered globally and per route group.
pub async fn enforce(
    State((limiter, tier)): State<(Arc<RateLimiter>, Tier)>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if tier == Tier::Global && skips_global_tier(request.uri().path()) {
        return Ok(next.run(request).await);
    }
    let trust_proxy = crate::config::get_config().trust_proxy;
    limiter.check(tier, client_addr(&request, trust_proxy))?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn limiter(max: u32, window: Duration) -> RateLimiter {
        let tier = TierLimit { window, max };
        RateLimiter::new(tier, tier, tier)
    }

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn excess_requests_within_window_are_rejected() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check(Tier::Global, addr(1)).is_ok());
        }
        let err = limiter.check(Tier::Global, addr(1)).unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            err.message,
            "Too many requests from this IP, please try again later."
        );
    }

    #[test]
    fn addresses_have_independent_buckets() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check(Tier::Global, addr(1)).is_ok());
        assert!(limiter.check(Tier::Global, addr(2)).is_ok());
        assert!(limiter.check(Tier::Global, addr(1)).is_err());
    }

    #[test]
    fn tiers_have_independent_buckets() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check(Tier::Ai, addr(1)).is_ok());
        assert!(limiter.check(Tier::Downloader, addr(1)).is_ok());
        assert!(limiter.check(Tier::Global, addr(1)).is_ok());
        assert!(limiter.check(Tier::Ai, addr(1)).is_err());
    }

    #[test]
    fn bucket_resets_after_window_elapses() {
        let limiter = limiter(1, Duration::from_millis(0));
        assert!(limiter.check(Tier::Global, addr(1)).is_ok());
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check(Tier::Global, addr(1)).is_ok());
    }

    #[test]
    fn expired_buckets_are_evicted_from_the_store() {
        let limiter = limiter(5, Duration::from_millis(0));
        limiter.check(Tier::Global, addr(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        limiter.check(Tier::Global, addr(2)).unwrap();

        let store = limiter.store.lock().unwrap();
        assert_eq!(store.buckets.len(), 1);
        assert!(store.buckets.contains_key(&(Tier::Global, addr(2))));
    }

    #[test]
    fn forwarded_header_is_ignored_unless_proxy_is_trusted() {
        let mut request = Request::builder()
            .uri("/api/downloader/videy")
            .header("x-forwarded-for", "1.2.3.4")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([9, 9, 9, 9], 4321))));

        assert_eq!(client_addr(&request, false), IpAddr::from([9, 9, 9, 9]));
        assert_eq!(client_addr(&request, true), IpAddr::from([1, 2, 3, 4]));
    }

    #[test]
    fn missing_peer_info_falls_back_to_unspecified() {
        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_addr(&request, false),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn health_and_root_skip_the_global_tier() {
        assert!(skips_global_tier("/health"));
        assert!(skips_global_tier("/"));
        assert!(!skips_global_tier("/api/ai/gemini"));
    }

    #[test]
    fn tier_messages_are_fixed() {
        assert!(Tier::Ai.message().contains("AI requests"));
        assert!(Tier::Downloader.message().contains("download requests"));
    }
}
