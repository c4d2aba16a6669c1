//! Per-client-IP rate limiting using governor keyed GCRA limiters.
//!
//! Two tiers share process-wide state:
//!   - global: 100 requests per 15 minutes, all routes
//!   - api:    10 requests per minute, the generation/listing routes
//!
//! Keying: the first `X-Forwarded-For` hop when present (we trust exactly one
//! proxy), otherwise the socket peer address.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub struct RateLimits {
    global: IpLimiter,
    api: IpLimiter,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimits {
    pub fn new() -> Self {
        // 100 per 15 min expressed as GCRA: one cell per 9s with burst 100.
        let global_quota = Quota::with_period(Duration::from_secs(9))
            .expect("static quota period")
            .allow_burst(NonZeroU32::new(100).expect("static burst"));
        let api_quota = Quota::per_minute(NonZeroU32::new(10).expect("static quota"));
        Self {
            global: RateLimiter::keyed(global_quota),
            api: RateLimiter::keyed(api_quota),
        }
    }

    pub fn check_global(&self, ip: IpAddr) -> Result<(), ApiError> {
        self.global.check_key(&ip).map_err(|_| ApiError::RateLimited)
    }

    pub fn check_api(&self, ip: IpAddr) -> Result<(), ApiError> {
        self.api.check_key(&ip).map_err(|_| ApiError::RateLimited)
    }
}

/// Client IP for limiter keying: first forwarded hop, else socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    peer.map(|p| p.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn request_ip(req: &Request) -> IpAddr {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(req.headers(), peer)
}

/// Middleware for all routes.
pub async fn global_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = request_ip(&req);
    if let Err(e) = state.limits.check_global(ip) {
        warn!(target: "fabula_backend", %ip, "global rate limit tripped");
        return e.into_response();
    }
    next.run(req).await
}

/// Middleware for the generation/listing routes.
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let ip = request_ip(&req);
    if let Err(e) = state.limits.check_api(ip) {
        warn!(target: "fabula_backend", %ip, "api rate limit tripped");
        return e.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:9999".parse().unwrap();
        assert_eq!(
            client_ip(&headers, Some(peer)),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn unparseable_forwarded_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), peer.ip());
        assert_eq!(
            client_ip(&HeaderMap::new(), None),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn api_limiter_allows_ten_then_blocks() {
        let limits = RateLimits::new();
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        for _ in 0..10 {
            assert!(limits.check_api(ip).is_ok());
        }
        assert!(limits.check_api(ip).is_err());
        // A different client is unaffected.
        let other: IpAddr = "203.0.113.10".parse().unwrap();
        assert!(limits.check_api(other).is_ok());
    }
}
